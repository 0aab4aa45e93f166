//! Error handling for the PPG pipeline
//!
//! Configuration and condition errors propagate to callers. Device and
//! analysis errors are recoverable and absorbed by the acquisition loop.

use core::fmt;

/// Result type alias for PPG pipeline operations
pub type PpgResult<T> = Result<T, PpgError>;

/// Error type for all PPG pipeline operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PpgError {
    /// Invalid filter, buffer or pipeline configuration
    Configuration {
        /// Description of the configuration error
        reason: String,
    },

    /// Device read failure
    Io {
        /// Description of the I/O failure
        reason: String,
    },

    /// Device line that does not hold a single numeric token
    Parse {
        /// The offending line, trimmed
        line: String,
    },

    /// HRV extraction failed for a window
    Analysis(AnalysisError),

    /// Condition was never registered with the aggregator
    UnknownCondition {
        /// Requested condition identifier
        condition: String,
    },

    /// Writing a recording to disk failed
    Persistence {
        /// Description of the persistence failure
        reason: String,
    },

    /// A pipeline task is gone
    ChannelClosed {
        /// Which channel was closed
        channel: &'static str,
    },
}

/// Failure modes of an HRV extraction over a single window
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Sample rate is not a positive finite number
    InvalidSampleRate {
        /// Provided sample rate
        rate: f64,
    },

    /// Window holds too few samples to analyse
    WindowTooShort {
        /// Samples provided
        len: usize,
        /// Samples required
        required: usize,
    },

    /// Not enough beats detected in the window
    InsufficientPeaks {
        /// Peaks found
        found: usize,
        /// Peaks required
        required: usize,
    },

    /// Too many RR intervals rejected as outliers
    InsufficientIntervals {
        /// Accepted intervals
        found: usize,
        /// Intervals required
        required: usize,
    },

    /// Routine produced NaN or infinite values
    NonFiniteMetrics,
}

impl PpgError {
    /// Shorthand for a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        PpgError::Configuration { reason: reason.into() }
    }

    /// Whether the acquisition loop should absorb this error and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PpgError::Io { .. } | PpgError::Parse { .. } | PpgError::Analysis(_)
        )
    }
}

impl fmt::Display for PpgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PpgError::Configuration { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            PpgError::Io { reason } => {
                write!(f, "Device I/O error: {}", reason)
            }
            PpgError::Parse { line } => {
                write!(f, "Unparsable device line: {:?}", line)
            }
            PpgError::Analysis(err) => {
                write!(f, "HRV analysis failed: {}", err)
            }
            PpgError::UnknownCondition { condition } => {
                write!(f, "Unknown experiment condition: {}", condition)
            }
            PpgError::Persistence { reason } => {
                write!(f, "Persistence error: {}", reason)
            }
            PpgError::ChannelClosed { channel } => {
                write!(f, "Pipeline channel closed: {}", channel)
            }
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidSampleRate { rate } => {
                write!(f, "invalid sample rate {}Hz", rate)
            }
            AnalysisError::WindowTooShort { len, required } => {
                write!(f, "window too short: {} samples, need {}", len, required)
            }
            AnalysisError::InsufficientPeaks { found, required } => {
                write!(f, "insufficient peaks: found {}, need {}", found, required)
            }
            AnalysisError::InsufficientIntervals { found, required } => {
                write!(f, "insufficient RR intervals: kept {}, need {}", found, required)
            }
            AnalysisError::NonFiniteMetrics => {
                write!(f, "metrics contain non-finite values")
            }
        }
    }
}

impl std::error::Error for PpgError {}

impl std::error::Error for AnalysisError {}

impl From<AnalysisError> for PpgError {
    fn from(err: AnalysisError) -> Self {
        PpgError::Analysis(err)
    }
}

impl From<std::io::Error> for PpgError {
    fn from(err: std::io::Error) -> Self {
        PpgError::Io { reason: err.to_string() }
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::PpgError::Configuration {
            reason: format!($($arg)*),
        }
    };
}

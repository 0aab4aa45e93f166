//! Device boundary: anything yielding one raw sample per read

use ppg_core::{PpgError, PpgResult};
use std::io::BufRead;

/// Blocking producer of raw PPG samples.
///
/// Each call returns the next reading in arrival order. Errors are per-read
/// and the caller decides whether to keep reading.
pub trait SampleSource: Send {
    fn read_next(&mut self) -> PpgResult<f64>;

    /// Source description for logging
    fn describe(&self) -> String {
        "sample source".to_string()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_next(&mut self) -> PpgResult<f64> {
        (**self).read_next()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Parse one device line holding a single floating-point token
pub fn parse_sample(line: &str) -> PpgResult<f64> {
    let trimmed = line.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PpgError::Parse {
            line: trimmed.to_string(),
        }),
    }
}

/// Newline-delimited numeric source over any buffered reader, such as an
/// opened serial device node.
pub struct LineSource<R> {
    reader: R,
    line: String,
    name: String,
    lines_read: u64,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self::named(reader, "line source")
    }

    pub fn named(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            line: String::with_capacity(32),
            name: name.into(),
            lines_read: 0,
        }
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl<R: BufRead + Send> SampleSource for LineSource<R> {
    fn read_next(&mut self) -> PpgResult<f64> {
        self.line.clear();
        let bytes = self.reader.read_line(&mut self.line)?;
        if bytes == 0 {
            return Err(PpgError::Io {
                reason: format!("{}: end of stream", self.name),
            });
        }
        self.lines_read += 1;
        parse_sample(&self.line)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

//! Experiment condition identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Experiment-defined label under which metrics are grouped
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionId(String);

impl ConditionId {
    pub fn new(name: impl Into<String>) -> Self {
        ConditionId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ConditionId {
    fn from(name: &str) -> Self {
        ConditionId::new(name)
    }
}

impl From<String> for ConditionId {
    fn from(name: String) -> Self {
        ConditionId(name)
    }
}

impl AsRef<str> for ConditionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

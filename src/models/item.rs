//! Listing entries as extracted and as collected.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the client profile a run executes under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentId(String);

impl EnvironmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EnvironmentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EnvironmentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row as read off a page, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,

    /// `None` when the row carried no timestamp element at all
    pub raw_timestamp: Option<String>,

    /// Time spent reading this row
    pub extraction_duration: Duration,
}

impl RawItem {
    pub fn new(title: impl Into<String>, raw_timestamp: Option<&str>) -> Self {
        Self {
            title: title.into(),
            raw_timestamp: raw_timestamp.map(str::to_string),
            extraction_duration: Duration::ZERO,
        }
    }
}

/// A collected listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub raw_timestamp: String,

    /// `None` when the raw timestamp could not be parsed
    pub normalized_time: Option<DateTime<Utc>>,

    /// 1-based rank in the run, assigned at insertion
    pub position: usize,
    pub source_page: usize,
    pub environment: EnvironmentId,
    pub extraction_duration_ms: u64,
}

//! Report persistence.
//!
//! ## Directory Structure
//!
//! ```text
//! reports/
//! ├── latest.json                    # Most recent report
//! ├── report-20251019-120000.json    # One file per run, never rewritten
//! └── report-20251019-130512.json
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{RunResult, Summary};
use crate::pipeline::ProbeOutcome;

pub use local::LocalStorage;

/// Metadata about a report write.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Where the timestamped report landed
    pub report_location: String,
    /// Where the latest pointer copy landed
    pub latest_location: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything one probe invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub target_count: usize,
    pub summary: Summary,
    pub results: Vec<RunResult>,
}

impl Report {
    pub fn new(outcome: ProbeOutcome, target_count: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            target_count,
            summary: outcome.summary,
            results: outcome.results,
        }
    }
}

/// Trait for report storage backends.
#[async_trait]
pub trait ReportStorage: Send + Sync {
    /// Persist a report and refresh the latest copy.
    async fn write_report(&self, report: &Report) -> Result<WriteMetadata>;

    /// Load the most recent report, if any was written.
    async fn load_latest(&self) -> Result<Option<Report>>;
}

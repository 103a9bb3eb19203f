//! Run telemetry, results and the cross-run summary.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::models::{EnvironmentId, Item};

/// A structured error observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    pub page: usize,
}

/// Counters owned by a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_duration_ms: u64,
    pub page_load_ms: Vec<u64>,

    /// Per-row extraction samples; rows parse in microseconds
    pub item_extraction_us: Vec<u64>,

    /// Requests issued by the fetcher
    pub network_events: usize,
    pub errors: Vec<ErrorEvent>,
}

impl RunMetrics {
    pub fn record_page_load(&mut self, elapsed: Duration) {
        self.page_load_ms.push(as_millis(elapsed));
    }

    pub fn record_extraction(&mut self, elapsed: Duration) {
        self.item_extraction_us
            .push(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
    }

    pub fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>, page: usize) {
        self.errors.push(ErrorEvent {
            kind,
            message: message.into(),
            page,
        });
    }

    pub fn mean_page_load_ms(&self) -> Option<f64> {
        mean(&self.page_load_ms)
    }

    pub fn mean_extraction_ms(&self) -> Option<f64> {
        mean(&self.item_extraction_us).map(|us| us / 1_000.0)
    }

    /// Count of logged errors of one kind.
    pub fn error_count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }
}

pub(crate) fn as_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn mean(values: &[u64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<u64>() as f64 / values.len() as f64)
}

/// Adjacent pair breaking the newest-first ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingViolation {
    /// Position of `current` in the collected sequence
    pub position: usize,
    pub current: Item,
    pub next: Item,
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Too many empty pages in a row
    EmptyPages,
    /// Consecutive page-level failures used up the budget
    ErrorBudget,
    /// The page cap was reached before the target
    PageLimit,
    /// The fetcher reported it can no longer be driven
    Unusable,
    /// The run crashed outright
    Crashed,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    /// No further page could be reached
    Exhausted,
    Aborted(AbortReason),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => f.write_str("target reached"),
            StopReason::Exhausted => f.write_str("no more pages"),
            StopReason::Aborted(reason) => write!(f, "aborted ({reason:?})"),
        }
    }
}

/// Outcome of one environment's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub environment: EnvironmentId,
    pub success: bool,
    pub items: Vec<Item>,
    pub violations: Vec<SortingViolation>,
    pub metrics: RunMetrics,
    pub fatal_error: Option<String>,
    pub stop_reason: StopReason,
    pub pages_visited: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// A run succeeds only with no violations and no fatal error.
    pub fn is_success(violations: &[SortingViolation], fatal_error: Option<&str>) -> bool {
        violations.is_empty() && fatal_error.is_none()
    }

    /// Result for a run that crashed before producing anything.
    pub fn crashed(
        environment: EnvironmentId,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let message = message.into();
        let mut metrics = RunMetrics::default();
        metrics.record_error(ErrorKind::Fatal, message.clone(), 0);
        let finished_at = Utc::now();
        metrics.total_duration_ms = (finished_at - started_at)
            .to_std()
            .map(as_millis)
            .unwrap_or_default();

        Self {
            environment,
            success: false,
            items: Vec::new(),
            violations: Vec::new(),
            metrics,
            fatal_error: Some(message),
            stop_reason: StopReason::Aborted(AbortReason::Crashed),
            pages_visited: 0,
            started_at,
            finished_at,
        }
    }

    pub fn items_collected(&self) -> usize {
        self.items.len()
    }

    /// Items whose timestamp could not be normalized.
    pub fn unparsed_timestamps(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.normalized_time.is_none())
            .count()
    }
}

/// Aggregate view over all runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,

    /// Fraction of successful runs, 0.0 when nothing ran
    pub success_rate: f64,
    pub average_items: f64,
    pub total_violations: usize,
    pub unparsed_timestamps: usize,
}

impl Summary {
    pub fn from_results(results: &[RunResult]) -> Self {
        let total_runs = results.len();
        let successful_runs = results.iter().filter(|r| r.success).count();
        let total_items: usize = results.iter().map(RunResult::items_collected).sum();

        let (success_rate, average_items) = if total_runs == 0 {
            (0.0, 0.0)
        } else {
            (
                successful_runs as f64 / total_runs as f64,
                total_items as f64 / total_runs as f64,
            )
        };

        Self {
            total_runs,
            successful_runs,
            failed_runs: total_runs - successful_runs,
            success_rate,
            average_items,
            total_violations: results.iter().map(|r| r.violations.len()).sum(),
            unparsed_timestamps: results.iter().map(RunResult::unparsed_timestamps).sum(),
        }
    }

    /// Process exit status: clean only when no ordering violation was seen.
    pub fn exit_code(&self) -> i32 {
        if self.total_violations == 0 { 0 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(position: usize) -> Item {
        Item {
            title: format!("Item {position}"),
            raw_timestamp: "1 minute ago".to_string(),
            normalized_time: None,
            position,
            source_page: 1,
            environment: EnvironmentId::from("chromium"),
            extraction_duration_ms: 0,
        }
    }

    fn result(env: &str, items: usize, violations: usize, fatal: Option<&str>) -> RunResult {
        let items: Vec<Item> = (1..=items).map(item).collect();
        let violations: Vec<SortingViolation> = (0..violations)
            .map(|i| SortingViolation {
                position: i + 1,
                current: item(i + 1),
                next: item(i + 2),
            })
            .collect();
        let now = Utc::now();
        RunResult {
            environment: EnvironmentId::from(env),
            success: RunResult::is_success(&violations, fatal),
            items,
            violations,
            metrics: RunMetrics::default(),
            fatal_error: fatal.map(str::to_string),
            stop_reason: StopReason::TargetReached,
            pages_visited: 1,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result("chromium", 100, 0, None),
            result("firefox", 100, 2, None),
            result("webkit", 40, 0, Some("browser closed")),
        ];
        let summary = Summary::from_results(&results);

        assert_eq!(summary.total_runs, 3);
        assert_eq!(summary.successful_runs, 1);
        assert_eq!(summary.failed_runs, 2);
        assert!((summary.success_rate - 1.0 / 3.0).abs() < f64::EPSILON);
        assert!((summary.average_items - 80.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_violations, 2);
        assert_eq!(summary.unparsed_timestamps, 240);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_extraction_mean_keeps_sub_millisecond_precision() {
        let mut metrics = RunMetrics::default();
        metrics.record_extraction(Duration::from_micros(250));
        metrics.record_extraction(Duration::from_micros(750));
        metrics.record_page_load(Duration::from_millis(40));

        assert_eq!(metrics.item_extraction_us, vec![250, 750]);
        assert_eq!(metrics.mean_extraction_ms(), Some(0.5));
        assert_eq!(metrics.mean_page_load_ms(), Some(40.0));
        assert_eq!(RunMetrics::default().mean_extraction_ms(), None);
    }

    #[test]
    fn test_summary_is_pure() {
        let results = vec![result("chromium", 10, 1, None), result("firefox", 5, 0, None)];
        assert_eq!(Summary::from_results(&results), Summary::from_results(&results));
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::from_results(&[]);
        assert_eq!(summary.total_runs, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_crashed_result_shape() {
        let result = RunResult::crashed(EnvironmentId::from("webkit"), "panicked", Utc::now());
        assert!(!result.success);
        assert!(result.items.is_empty());
        assert_eq!(result.fatal_error.as_deref(), Some("panicked"));
        assert_eq!(result.stop_reason, StopReason::Aborted(AbortReason::Crashed));
        assert_eq!(result.metrics.error_count(ErrorKind::Fatal), 1);
    }

    #[test]
    fn test_metric_means() {
        let mut metrics = RunMetrics::default();
        assert_eq!(metrics.mean_page_load_ms(), None);
        metrics.record_page_load(Duration::from_millis(100));
        metrics.record_page_load(Duration::from_millis(300));
        assert_eq!(metrics.mean_page_load_ms(), Some(200.0));
    }

    #[test]
    fn test_stop_reason_serialization() {
        let json = serde_json::to_string(&StopReason::Aborted(AbortReason::ErrorBudget)).unwrap();
        assert_eq!(json, r#"{"state":"aborted","reason":"error_budget"}"#);
        let json = serde_json::to_string(&StopReason::TargetReached).unwrap();
        assert_eq!(json, r#"{"state":"target_reached"}"#);
    }
}

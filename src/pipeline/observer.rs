// src/pipeline/observer.rs

//! Run event sink.
//!
//! The controller reports progress through a [`RunObserver`] instead of
//! logging directly, so a run can be watched, recorded or silenced.

use std::fmt;

use crate::models::{EnvironmentId, ErrorEvent, Item, RunResult};

/// Why a row was not collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    MissingTimestamp,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTitle => f.write_str("missing title"),
            SkipReason::MissingTimestamp => f.write_str("missing timestamp"),
        }
    }
}

/// Receives structured events from a running probe.
pub trait RunObserver: Send + Sync {
    fn run_started(&self, _environment: &EnvironmentId, _target_count: usize) {}

    /// A page was read: `rows` found on it, `collected` total so far.
    fn page_loaded(&self, _environment: &EnvironmentId, _page: usize, _rows: usize, _collected: usize) {}

    fn item_collected(&self, _item: &Item) {}

    fn item_skipped(&self, _environment: &EnvironmentId, _page: usize, _reason: SkipReason) {}

    fn error(&self, _environment: &EnvironmentId, _event: &ErrorEvent) {}

    fn run_finished(&self, _result: &RunResult) {}
}

/// Forwards run events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn run_started(&self, environment: &EnvironmentId, target_count: usize) {
        log::info!("[{}] Starting run, target {} items", environment, target_count);
    }

    fn page_loaded(&self, environment: &EnvironmentId, page: usize, rows: usize, collected: usize) {
        log::info!(
            "[{}] Page {}: {} rows, {} items collected",
            environment,
            page,
            rows,
            collected
        );
    }

    fn item_collected(&self, item: &Item) {
        if item.normalized_time.is_none() {
            log::debug!(
                "[{}] #{} has an unparsed timestamp '{}'",
                item.environment,
                item.position,
                item.raw_timestamp
            );
        }
    }

    fn item_skipped(&self, environment: &EnvironmentId, page: usize, reason: SkipReason) {
        log::debug!("[{}] Skipped row on page {}: {}", environment, page, reason);
    }

    fn error(&self, environment: &EnvironmentId, event: &ErrorEvent) {
        log::warn!(
            "[{}] {} on page {}: {}",
            environment,
            event.kind,
            event.page,
            event.message
        );
    }

    fn run_finished(&self, result: &RunResult) {
        if let Some(fatal) = &result.fatal_error {
            log::error!("[{}] Run failed: {}", result.environment, fatal);
        }
        log::info!(
            "[{}] Finished ({}): {} items, {} violations in {}ms",
            result.environment,
            result.stop_reason,
            result.items.len(),
            result.violations.len(),
            result.metrics.total_duration_ms
        );
    }
}

// src/pipeline/paginate.rs

//! Pagination-and-recovery loop for a single environment.
//!
//! Each iteration runs the budget guard, reads the current page, collects its
//! rows and decides whether to retry in place, advance or stop:
//!
//! - an empty page is reloaded in place until the reload threshold is hit,
//!   then the run aborts
//! - a page-level failure is logged, counted against the consecutive error
//!   budget and retried in place while budget remains
//! - a broken row is logged and skipped; it never touches the error budget
//! - a failed advance ends the run as exhausted
//!
//! However the loop ends, the collected items are validated and a
//! [`RunResult`] is produced.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{
    AbortReason, Config, EnvironmentId, ErrorEvent, Item, RawItem, RunMetrics, RunResult,
    StopReason, as_millis,
};
use crate::pipeline::budget::{Budget, BudgetCheck};
use crate::pipeline::observer::{RunObserver, SkipReason};
use crate::services::{PageFetcher, ordering, timestamp};

/// Source of the reference instant for relative timestamps.
pub type Clock = fn() -> DateTime<Utc>;

/// Mutable state owned by one run.
struct RunState {
    collected: Vec<Item>,
    page: usize,
    consecutive_errors: usize,
    metrics: RunMetrics,
    fatal_error: Option<String>,
}

impl RunState {
    fn new() -> Self {
        Self {
            collected: Vec::new(),
            page: 1,
            consecutive_errors: 0,
            metrics: RunMetrics::default(),
            fatal_error: None,
        }
    }
}

/// Drives one environment's fetcher until a budget ends the run.
pub struct PaginationController {
    fetcher: Box<dyn PageFetcher>,
    config: Arc<Config>,
    budget: Budget,
    environment: EnvironmentId,
    observer: Arc<dyn RunObserver>,
    clock: Clock,
}

impl PaginationController {
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        config: Arc<Config>,
        environment: EnvironmentId,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        let budget = Budget::from_config(&config.probe);
        Self {
            fetcher,
            config,
            budget,
            environment,
            observer,
            clock: Utc::now,
        }
    }

    /// Replace the clock used to resolve relative timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run to completion. Anticipated failures end up inside the result.
    pub async fn run(mut self) -> RunResult {
        let started_at = Utc::now();
        let timer = Instant::now();
        self.observer
            .run_started(&self.environment, self.budget.target_count);

        let mut state = RunState::new();
        if let Err(error) = self.fetcher.open().await {
            self.page_failure(&mut state, error).await;
        }

        let stop_reason = self.paginate(&mut state).await;
        let violations = ordering::validate(&state.collected);

        if stop_reason != StopReason::TargetReached {
            let label = format!("page{}-stopped", state.page);
            self.fetcher.capture_diagnostic_snapshot(&label).await;
        }
        if !violations.is_empty() {
            let label = format!("page{}-violations", state.page);
            self.fetcher.capture_diagnostic_snapshot(&label).await;
        }

        state.metrics.network_events = self.fetcher.network_events();
        state.metrics.total_duration_ms = as_millis(timer.elapsed());

        let result = RunResult {
            environment: self.environment.clone(),
            success: RunResult::is_success(&violations, state.fatal_error.as_deref()),
            items: state.collected,
            violations,
            metrics: state.metrics,
            fatal_error: state.fatal_error,
            stop_reason,
            pages_visited: state.page,
            started_at,
            finished_at: Utc::now(),
        };
        self.observer.run_finished(&result);
        result
    }

    async fn paginate(&mut self, state: &mut RunState) -> StopReason {
        loop {
            if let BudgetCheck::Stop(reason) = self.budget.check(
                state.collected.len(),
                state.consecutive_errors,
                state.page,
            ) {
                return reason;
            }

            if !self.fetcher.page_is_usable() {
                let message = format!("fetcher stopped responding on page {}", state.page);
                self.record_error(state, ErrorKind::Fatal, message.clone());
                state.fatal_error = Some(message);
                return StopReason::Aborted(AbortReason::Unusable);
            }

            let page_timer = Instant::now();
            let rows = match self.fetcher.fetch_items().await {
                Ok(rows) => rows,
                Err(error) => {
                    self.page_failure(state, error).await;
                    continue;
                }
            };

            if rows.is_empty() {
                state.consecutive_errors += 1;
                let message = format!("page {} returned no items", state.page);
                self.record_error(state, ErrorKind::PageUnavailable, message);
                if state.consecutive_errors < self.config.probe.reload_threshold() {
                    self.reload(state).await;
                    continue;
                }
                return StopReason::Aborted(AbortReason::EmptyPages);
            }

            let row_count = rows.len();
            let now = (self.clock)();
            if self.collect_rows(state, rows, now) > 0 {
                state.consecutive_errors = 0;
            }
            state.metrics.record_page_load(page_timer.elapsed());
            self.observer.page_loaded(
                &self.environment,
                state.page,
                row_count,
                state.collected.len(),
            );

            if let BudgetCheck::Stop(reason) =
                self.budget.may_advance(state.collected.len(), state.page)
            {
                return reason;
            }
            if !self.fetcher.has_next_page() {
                log::info!(
                    "[{}] Listing ends at page {}",
                    self.environment,
                    state.page
                );
                return StopReason::Exhausted;
            }
            if !self.fetcher.advance_to_next_page().await {
                let error = AppError::navigation(format!(
                    "could not advance past page {}",
                    state.page
                ));
                self.record_error(state, error.kind(), error.to_string());
                return StopReason::Exhausted;
            }
            state.page += 1;

            let delay = self.config.probe.page_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Append usable rows until the target is met, returning how many were added.
    ///
    /// Relative timestamps on one page all resolve against the same `now`.
    fn collect_rows(
        &self,
        state: &mut RunState,
        rows: Vec<Result<RawItem>>,
        now: DateTime<Utc>,
    ) -> usize {
        let remaining = self.budget.remaining(state.collected.len());
        let mut added = 0;

        for row in rows {
            if added >= remaining {
                break;
            }

            let raw = match row {
                Ok(raw) => raw,
                Err(error) => {
                    self.record_error(state, ErrorKind::ItemExtraction, error.to_string());
                    continue;
                }
            };

            let title = raw.title.trim();
            if self.config.site.is_placeholder_title(title) {
                self.observer
                    .item_skipped(&self.environment, state.page, SkipReason::MissingTitle);
                continue;
            }
            let Some(raw_timestamp) = raw
                .raw_timestamp
                .as_deref()
                .map(str::trim)
                .filter(|ts| !ts.is_empty())
            else {
                self.observer
                    .item_skipped(&self.environment, state.page, SkipReason::MissingTimestamp);
                continue;
            };

            let item = Item {
                title: title.to_string(),
                raw_timestamp: raw_timestamp.to_string(),
                normalized_time: timestamp::normalize(raw_timestamp, now).ok(),
                position: state.collected.len() + 1,
                source_page: state.page,
                environment: self.environment.clone(),
                extraction_duration_ms: as_millis(raw.extraction_duration),
            };
            state.metrics.record_extraction(raw.extraction_duration);
            self.observer.item_collected(&item);
            state.collected.push(item);
            added += 1;
        }
        added
    }

    /// Count a page-level failure and retry in place while budget remains.
    async fn page_failure(&mut self, state: &mut RunState, error: AppError) {
        self.record_error(state, error.kind(), error.to_string());
        state.consecutive_errors += 1;
        if state.consecutive_errors < self.budget.max_consecutive_errors {
            self.reload(state).await;
        }
    }

    async fn reload(&mut self, state: &mut RunState) {
        if let Err(error) = self.fetcher.reload().await {
            self.record_error(state, error.kind(), format!("reload failed: {error}"));
        }
    }

    fn record_error(&self, state: &mut RunState, kind: ErrorKind, message: String) {
        let event = ErrorEvent {
            kind,
            message,
            page: state.page,
        };
        self.observer.error(&self.environment, &event);
        state.metrics.errors.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::observer::LogObserver;
    use crate::pipeline::observer::testing::RecordingObserver;
    use crate::services::fetcher::testing::{Response, Row, ScriptedFetcher};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap()
    }

    fn config(target: usize) -> Config {
        let mut config = Config::default();
        config.probe.target_count = target;
        config.probe.page_delay_ms = 0;
        config
    }

    async fn run_with(fetcher: ScriptedFetcher, config: Config) -> RunResult {
        PaginationController::new(
            Box::new(fetcher),
            Arc::new(config),
            EnvironmentId::from("chromium"),
            Arc::new(LogObserver),
        )
        .with_clock(fixed_now)
        .run()
        .await
    }

    fn page(minutes: &[u32]) -> Response {
        let rows: Vec<(String, String)> = minutes
            .iter()
            .map(|m| (format!("Story {m}"), format!("{m} minutes ago")))
            .collect();
        let refs: Vec<(&str, Option<&str>)> = rows
            .iter()
            .map(|(t, ts)| (t.as_str(), Some(ts.as_str())))
            .collect();
        Response::rows(&refs)
    }

    #[tokio::test]
    async fn test_collects_across_pages_up_to_target() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![page(&[1, 2, 3])],
            vec![page(&[4, 5, 6])],
            vec![page(&[7, 8, 9])],
        ]);
        let log = fetcher.log();
        let result = run_with(fetcher, config(5)).await;

        assert!(result.success);
        assert_eq!(result.stop_reason, StopReason::TargetReached);
        assert_eq!(result.items.len(), 5);
        assert_eq!(result.pages_visited, 2);
        for (i, item) in result.items.iter().enumerate() {
            assert_eq!(item.position, i + 1);
        }
        assert_eq!(result.items[4].title, "Story 5");
        assert_eq!(result.items[4].source_page, 2);
        assert_eq!(
            result.items[0].normalized_time,
            Some(fixed_now() - chrono::TimeDelta::minutes(1))
        );
        assert_eq!(result.metrics.page_load_ms.len(), 2);
        assert_eq!(result.metrics.item_extraction_us.len(), 5);
        assert_eq!(result.metrics.network_events, 2);
        assert!(log.lock().unwrap().snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_always_empty_pages_terminate() {
        let mut config = config(100);
        config.probe.max_consecutive_errors = 3;
        let fetcher = ScriptedFetcher::new(vec![vec![Response::empty()]]);
        let log = fetcher.log();
        let result = run_with(fetcher, config).await;

        assert!(matches!(result.stop_reason, StopReason::Aborted(_)));
        assert_eq!(result.stop_reason, StopReason::Aborted(AbortReason::EmptyPages));
        let log = log.lock().unwrap();
        assert!(log.fetches.len() <= 3);
        assert_eq!(log.reloads, 1);
        assert!(result.items.is_empty());
        assert!(result.fatal_error.is_none());
        assert_eq!(result.metrics.error_count(ErrorKind::PageUnavailable), 2);
        assert_eq!(log.snapshots, vec!["page1-stopped".to_string()]);
    }

    #[tokio::test]
    async fn test_page_failures_exhaust_error_budget() {
        let fetcher = ScriptedFetcher::new(vec![vec![Response::Fail("HTTP 503".into())]]);
        let log = fetcher.log();
        let result = run_with(fetcher, config(100)).await;

        assert_eq!(result.stop_reason, StopReason::Aborted(AbortReason::ErrorBudget));
        let log = log.lock().unwrap();
        assert_eq!(log.fetches, vec![1, 1, 1]);
        assert_eq!(log.reloads, 2);
        assert_eq!(result.metrics.errors.len(), 3);
        assert!(result.metrics.errors.iter().all(|e| e.page == 1));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![Response::Fail("timeout".into()), page(&[1, 2])],
            vec![Response::Fail("timeout".into()), Response::Fail("timeout".into()), page(&[3])],
        ]);
        let log = fetcher.log();
        let result = run_with(fetcher, config(3)).await;

        assert!(result.success);
        assert_eq!(result.items.len(), 3);
        assert_eq!(result.metrics.error_count(ErrorKind::PageUnavailable), 3);
        let log = log.lock().unwrap();
        assert_eq!(log.fetches, vec![1, 1, 2, 2, 2]);
        assert_eq!(log.reloads, 3);
    }

    #[tokio::test]
    async fn test_skipped_rows_leave_no_position_gap() {
        let fetcher = ScriptedFetcher::new(vec![vec![Response::rows(&[
            ("A", Some("1 minute ago")),
            ("", Some("2 minutes ago")),
            ("B", None),
            ("[dead]", Some("3 minutes ago")),
            ("C", Some("  ")),
            ("D", Some("4 minutes ago")),
        ])]]);
        let observer = Arc::new(RecordingObserver::default());
        let result = PaginationController::new(
            Box::new(fetcher),
            Arc::new(config(10)),
            EnvironmentId::from("firefox"),
            observer.clone(),
        )
        .with_clock(fixed_now)
        .run()
        .await;

        let collected: Vec<_> = result
            .items
            .iter()
            .map(|i| (i.title.as_str(), i.position))
            .collect();
        assert_eq!(collected, vec![("A", 1), ("D", 2)]);
        assert_eq!(result.stop_reason, StopReason::Exhausted);
        assert!(result.metrics.errors.is_empty());

        let lines = observer.lines();
        assert_eq!(lines.iter().filter(|l| l.starts_with("skip")).count(), 4);
        assert!(lines.contains(&"skip firefox 1 missing timestamp".to_string()));
        assert_eq!(lines.first().map(String::as_str), Some("start firefox 10"));
        assert_eq!(lines.last().map(String::as_str), Some("finish firefox 2"));
    }

    #[tokio::test]
    async fn test_broken_rows_do_not_touch_error_budget() {
        let broken = Response::Rows(vec![
            Row::Broken("title element missing".into()),
            Row::Item(RawItem::new("A", Some("1 minute ago"))),
        ]);
        let fetcher = ScriptedFetcher::new(vec![
            vec![broken.clone()],
            vec![broken.clone()],
            vec![broken.clone()],
            vec![broken],
        ]);
        let mut config = config(4);
        config.probe.max_consecutive_errors = 1;
        let result = run_with(fetcher, config).await;

        assert_eq!(result.stop_reason, StopReason::TargetReached);
        assert_eq!(result.items.len(), 4);
        assert_eq!(result.metrics.error_count(ErrorKind::ItemExtraction), 4);
    }

    #[tokio::test]
    async fn test_detects_ordering_violation() {
        let fetcher = ScriptedFetcher::new(vec![vec![Response::rows(&[
            ("A", Some("1 minute ago")),
            ("B", Some("10 minutes ago")),
            ("C", Some("5 minutes ago")),
            ("D", Some("2025-10-19T11:00:00 1760871600")),
        ])]]);
        let log = fetcher.log();
        let result = run_with(fetcher, config(4)).await;

        assert!(!result.success);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].position, 2);
        assert_eq!(result.violations[0].current.title, "B");
        assert_eq!(result.violations[0].next.title, "C");
        assert_eq!(
            log.lock().unwrap().snapshots,
            vec!["page1-violations".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unparsed_timestamp_is_still_collected() {
        let fetcher = ScriptedFetcher::new(vec![vec![Response::rows(&[
            ("A", Some("just now")),
            ("B", Some("3 minutes ago")),
        ])]]);
        let result = run_with(fetcher, config(2)).await;

        assert!(result.success);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].normalized_time, None);
        assert_eq!(result.items[0].raw_timestamp, "just now");
        assert_eq!(result.unparsed_timestamps(), 1);
    }

    #[tokio::test]
    async fn test_failed_advance_exhausts_run() {
        let fetcher =
            ScriptedFetcher::new(vec![vec![page(&[1])], vec![page(&[2])]]).failing_advance();
        let result = run_with(fetcher, config(10)).await;

        assert_eq!(result.stop_reason, StopReason::Exhausted);
        assert!(result.success);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.metrics.error_count(ErrorKind::Navigation), 1);
    }

    #[tokio::test]
    async fn test_page_cap_stops_run() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![page(&[1])],
            vec![page(&[2])],
            vec![page(&[3])],
        ]);
        let log = fetcher.log();
        let mut config = config(10);
        config.probe.max_pages = 2;
        let result = run_with(fetcher, config).await;

        assert_eq!(result.stop_reason, StopReason::Aborted(AbortReason::PageLimit));
        assert_eq!(result.pages_visited, 2);
        assert_eq!(result.items.len(), 2);
        assert_eq!(log.lock().unwrap().advances, 1);
    }

    #[tokio::test]
    async fn test_equal_relative_times_on_a_page_are_in_order() {
        let fetcher = ScriptedFetcher::new(vec![vec![Response::rows(&[
            ("A", Some("5 minutes ago")),
            ("B", Some("5 minutes ago")),
            ("C", Some("5 minutes ago")),
            ("D", Some("5 minutes ago")),
        ])]]);
        let result = PaginationController::new(
            Box::new(fetcher),
            Arc::new(config(4)),
            EnvironmentId::from("chromium"),
            Arc::new(LogObserver),
        )
        .run()
        .await;

        assert!(result.violations.is_empty());
        assert!(result.success);
        let first = result.items[0].normalized_time;
        assert!(first.is_some());
        assert!(result.items.iter().all(|item| item.normalized_time == first));
    }

    #[tokio::test]
    async fn test_page_without_collected_items_keeps_error_count() {
        let skipped = Response::rows(&[("[dead]", Some("1 minute ago")), ("B", None)]);
        let fetcher = ScriptedFetcher::new(vec![
            vec![
                Response::Fail("HTTP 502".into()),
                Response::Fail("HTTP 502".into()),
                skipped,
            ],
            vec![Response::Fail("HTTP 502".into())],
            vec![page(&[3])],
        ]);
        let log = fetcher.log();
        let result = run_with(fetcher, config(10)).await;

        assert_eq!(result.stop_reason, StopReason::Aborted(AbortReason::ErrorBudget));
        assert!(result.items.is_empty());
        let log = log.lock().unwrap();
        assert_eq!(log.fetches, vec![1, 1, 1, 2]);
        assert_eq!(log.reloads, 2);
        assert_eq!(result.metrics.error_count(ErrorKind::PageUnavailable), 3);
    }

    #[tokio::test]
    async fn test_unusable_fetcher_sets_fatal_error() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![page(&[1])],
            vec![page(&[2])],
            vec![page(&[3])],
        ])
        .unusable_after(2);
        let result = run_with(fetcher, config(10)).await;

        assert!(!result.success);
        assert_eq!(result.stop_reason, StopReason::Aborted(AbortReason::Unusable));
        assert_eq!(result.items.len(), 2);
        assert!(result.fatal_error.is_some());
        assert_eq!(result.metrics.error_count(ErrorKind::Fatal), 1);
    }
}

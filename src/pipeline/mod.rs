//! Probe pipeline.
//!
//! - `budget`: stop conditions bounding every run
//! - `paginate`: the per-environment pagination and recovery loop
//! - `orchestrate`: one isolated run per environment, plus the summary
//! - `report`: console rendering of the results

pub mod budget;
pub mod observer;
pub mod orchestrate;
pub mod paginate;
pub mod report;

use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, Environment};
use crate::services::HttpFetcherFactory;
use crate::storage::{Report, ReportStorage};

pub use budget::{Budget, BudgetCheck};
pub use observer::{LogObserver, RunObserver, SkipReason};
pub use orchestrate::{ProbeOutcome, RunOrchestrator};
pub use paginate::PaginationController;

/// Probe every environment over HTTP, print and persist the report.
///
/// The previous report, when one exists, is compared against before it is replaced.
pub async fn run_probe(
    config: Arc<Config>,
    environments: &[Environment],
    storage: &dyn ReportStorage,
) -> Result<Report> {
    log::info!(
        "Probing {} environment(s) for {} items each",
        environments.len(),
        config.probe.target_count
    );

    let orchestrator = RunOrchestrator::new(
        Arc::clone(&config),
        Arc::new(HttpFetcherFactory::new(Arc::clone(&config))),
        Arc::new(LogObserver),
    );
    let previous = match storage.load_latest().await {
        Ok(previous) => previous,
        Err(e) => {
            log::warn!("Previous report could not be read: {}", e);
            None
        }
    };
    let outcome = orchestrator.run_all(environments).await;

    report::print_report(&outcome.results, &outcome.summary);
    if let Some(previous) = &previous {
        report::print_comparison(previous, &outcome.summary);
    }

    let report = Report::new(outcome, config.probe.target_count);
    let meta = storage.write_report(&report).await?;
    log::info!(
        "Latest report: {} (generated {})",
        meta.latest_location,
        meta.timestamp
    );

    Ok(report)
}

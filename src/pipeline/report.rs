// src/pipeline/report.rs

//! Human-readable console report.

use crate::models::{RunResult, SortingViolation, Summary};
use crate::storage::Report;
use crate::utils::{log, truncate_graphemes};

/// Violations listed per environment before the rest are elided.
const MAX_LISTED_VIOLATIONS: usize = 5;

/// Title width in violation lines.
const TITLE_WIDTH: usize = 48;

/// Print a section per environment followed by the cross-run summary.
pub fn print_report(results: &[RunResult], summary: &Summary) {
    log::header("Sort order probe report");

    for result in results {
        print_run(result);
        log::separator();
    }

    log::summary("All environments", &summary_lines(summary));
}

/// Print how this invocation compares with the previous stored report.
pub fn print_comparison(previous: &Report, current: &Summary) {
    let title = format!(
        "Compared with {}",
        previous.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    log::summary(&title, &comparison_lines(&previous.summary, current));
}

fn comparison_lines(previous: &Summary, current: &Summary) -> Vec<(&'static str, String)> {
    vec![
        (
            "Successful",
            format!(
                "{}/{} -> {}/{}",
                previous.successful_runs,
                previous.total_runs,
                current.successful_runs,
                current.total_runs
            ),
        ),
        (
            "Total violations",
            format!("{} -> {}", previous.total_violations, current.total_violations),
        ),
        (
            "Average items",
            format!("{:.1} -> {:.1}", previous.average_items, current.average_items),
        ),
    ]
}

fn print_run(result: &RunResult) {
    let status = format!(
        "[{}] {} ({})",
        result.environment,
        if result.success { "PASS" } else { "FAIL" },
        result.stop_reason
    );
    if result.success {
        log::success(&status);
    } else {
        log::failure(&status);
    }

    log::sub_item(&format!(
        "Items: {} over {} page(s), {} unparsed timestamp(s)",
        result.items.len(),
        result.pages_visited,
        result.unparsed_timestamps()
    ));
    log::sub_item(&format!(
        "Errors: {}, network events: {}, duration: {}ms",
        result.metrics.errors.len(),
        result.metrics.network_events,
        result.metrics.total_duration_ms
    ));
    if let (Some(page), Some(item)) = (
        result.metrics.mean_page_load_ms(),
        result.metrics.mean_extraction_ms(),
    ) {
        log::sub_item(&format!("Mean page load: {page:.1}ms, mean extraction: {item:.3}ms"));
    }
    if let Some(fatal) = &result.fatal_error {
        log::sub_item(&format!("Fatal: {}", fatal));
    }

    log::sub_item(&format!("Violations: {}", result.violations.len()));
    for violation in result.violations.iter().take(MAX_LISTED_VIOLATIONS) {
        log::sub_item(&violation_line(violation));
    }
    if result.violations.len() > MAX_LISTED_VIOLATIONS {
        log::sub_item(&format!(
            "  ... and {} more",
            result.violations.len() - MAX_LISTED_VIOLATIONS
        ));
    }
}

fn violation_line(violation: &SortingViolation) -> String {
    format!(
        "  #{} \"{}\" ({}) is older than #{} \"{}\" ({})",
        violation.position,
        truncate_graphemes(&violation.current.title, TITLE_WIDTH),
        violation.current.raw_timestamp,
        violation.next.position,
        truncate_graphemes(&violation.next.title, TITLE_WIDTH),
        violation.next.raw_timestamp
    )
}

fn summary_lines(summary: &Summary) -> Vec<(&'static str, String)> {
    vec![
        ("Runs", summary.total_runs.to_string()),
        (
            "Successful",
            format!("{}/{}", summary.successful_runs, summary.total_runs),
        ),
        ("Success rate", format!("{:.1}%", summary.success_rate * 100.0)),
        ("Average items", format!("{:.1}", summary.average_items)),
        ("Total violations", summary.total_violations.to_string()),
        ("Unparsed timestamps", summary.unparsed_timestamps.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnvironmentId, Item};

    fn item(position: usize, title: &str, raw: &str) -> Item {
        Item {
            title: title.to_string(),
            raw_timestamp: raw.to_string(),
            normalized_time: None,
            position,
            source_page: 1,
            environment: EnvironmentId::from("webkit"),
            extraction_duration_ms: 0,
        }
    }

    #[test]
    fn test_violation_line_truncates_titles() {
        let long = "x".repeat(80);
        let violation = SortingViolation {
            position: 2,
            current: item(2, &long, "10 minutes ago"),
            next: item(3, "Short", "5 minutes ago"),
        };
        let line = violation_line(&violation);
        assert!(line.starts_with("  #2 \""));
        assert!(line.contains(&format!("{}…", "x".repeat(TITLE_WIDTH - 1))));
        assert!(line.contains("#3 \"Short\" (5 minutes ago)"));
    }

    #[test]
    fn test_comparison_lines() {
        let previous = Summary {
            total_runs: 3,
            successful_runs: 1,
            failed_runs: 2,
            success_rate: 1.0 / 3.0,
            average_items: 90.0,
            total_violations: 4,
            unparsed_timestamps: 0,
        };
        let current = Summary::from_results(&[]);
        let lines = comparison_lines(&previous, &current);
        assert_eq!(lines[0], ("Successful", "1/3 -> 0/0".to_string()));
        assert_eq!(lines[1], ("Total violations", "4 -> 0".to_string()));
        assert_eq!(lines[2], ("Average items", "90.0 -> 0.0".to_string()));
    }

    #[test]
    fn test_summary_lines() {
        let summary = Summary::from_results(&[]);
        let lines = summary_lines(&summary);
        assert_eq!(lines[0], ("Runs", "0".to_string()));
        assert_eq!(lines[2], ("Success rate", "0.0%".to_string()));
    }
}

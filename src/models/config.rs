//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::EnvironmentId;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pagination budgets and bounded waits
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Where the listing lives and how its rows are read
    #[serde(default)]
    pub site: SiteConfig,

    /// Client profiles, one run each
    #[serde(default = "defaults::environments")]
    pub environments: Vec<Environment>,

    /// Report and snapshot locations
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let probe = &self.probe;
        if probe.target_count == 0 {
            return Err(AppError::validation("probe.target_count must be > 0"));
        }
        if probe.max_pages == 0 {
            return Err(AppError::validation("probe.max_pages must be > 0"));
        }
        if probe.max_consecutive_errors == 0 {
            return Err(AppError::validation(
                "probe.max_consecutive_errors must be > 0",
            ));
        }
        if probe.page_timeout_ms == 0 || probe.navigation_timeout_ms == 0 {
            return Err(AppError::validation(
                "probe.page_timeout_ms and probe.navigation_timeout_ms must be > 0",
            ));
        }
        if url::Url::parse(&self.site.start_url).is_err() {
            return Err(AppError::validation(format!(
                "site.start_url is not a valid URL: {}",
                self.site.start_url
            )));
        }
        for (name, selector) in [
            ("row_selector", &self.site.row_selector),
            ("title_selector", &self.site.title_selector),
            ("timestamp_selector", &self.site.timestamp_selector),
            ("next_page_selector", &self.site.next_page_selector),
        ] {
            if scraper::Selector::parse(selector).is_err() {
                return Err(AppError::validation(format!(
                    "site.{name} is not a valid CSS selector: {selector}"
                )));
            }
        }
        if self.environments.is_empty() {
            return Err(AppError::validation("No environments defined"));
        }
        for env in &self.environments {
            if env.id.as_str().trim().is_empty() {
                return Err(AppError::validation("environment id is empty"));
            }
            if env.user_agent.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "environment '{}' has an empty user_agent",
                    env.id
                )));
            }
        }
        Ok(())
    }

    /// Pick the environments named in `ids`, keeping the requested order.
    ///
    /// An empty selection means every configured environment. Repeated ids
    /// run once.
    pub fn select_environments(&self, ids: &[String]) -> Result<Vec<Environment>> {
        if ids.is_empty() {
            return Ok(self.environments.clone());
        }

        let mut selected: Vec<Environment> = Vec::with_capacity(ids.len());
        for id in ids {
            if selected.iter().any(|env| env.id.as_str() == id) {
                continue;
            }
            let env = self
                .environments
                .iter()
                .find(|env| env.id.as_str() == id)
                .ok_or_else(|| AppError::config(format!("Unknown environment '{id}'")))?;
            selected.push(env.clone());
        }
        Ok(selected)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            site: SiteConfig::default(),
            environments: defaults::environments(),
            output: OutputConfig::default(),
        }
    }
}

/// Pagination budgets and bounded waits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Items to collect per environment
    #[serde(default = "defaults::target_count")]
    pub target_count: usize,

    /// Hard cap on pages visited, whatever the target
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Page-level failure budget
    #[serde(default = "defaults::max_consecutive_errors")]
    pub max_consecutive_errors: usize,

    /// Consecutive empty pages tolerated before the run aborts
    #[serde(default = "defaults::page_reload_limit")]
    pub page_reload_limit: usize,

    /// Bound on waiting for page content
    #[serde(default = "defaults::timeout_ms")]
    pub page_timeout_ms: u64,

    /// Bound on a single navigation request
    #[serde(default = "defaults::timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Pause between pages
    #[serde(default = "defaults::page_delay_ms")]
    pub page_delay_ms: u64,
}

impl ProbeConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Inner reload threshold, always strictly below the global error budget.
    pub fn reload_threshold(&self) -> usize {
        self.page_reload_limit
            .min(self.max_consecutive_errors.saturating_sub(1))
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_count: defaults::target_count(),
            max_pages: defaults::max_pages(),
            max_consecutive_errors: defaults::max_consecutive_errors(),
            page_reload_limit: defaults::page_reload_limit(),
            page_timeout_ms: defaults::timeout_ms(),
            navigation_timeout_ms: defaults::timeout_ms(),
            page_delay_ms: defaults::page_delay_ms(),
        }
    }
}

/// Where a row's timestamp element sits relative to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampScope {
    /// Inside the row itself
    Row,
    /// Inside the row's next sibling element
    #[default]
    NextSibling,
}

/// Listing location and row selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// First page of the listing
    #[serde(default = "defaults::start_url")]
    pub start_url: String,

    /// CSS selector for listing rows
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// CSS selector for the title element within a row
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// CSS selector for the timestamp element
    #[serde(default = "defaults::timestamp_selector")]
    pub timestamp_selector: String,

    /// Attribute holding the timestamp; element text is used when absent
    #[serde(default = "defaults::timestamp_attr")]
    pub timestamp_attr: Option<String>,

    #[serde(default)]
    pub timestamp_scope: TimestampScope,

    /// CSS selector for the "next page" link
    #[serde(default = "defaults::next_page_selector")]
    pub next_page_selector: String,

    /// Titles that count as missing
    #[serde(default = "defaults::placeholder_titles")]
    pub placeholder_titles: Vec<String>,

    /// Substrings stripped from titles before use
    #[serde(default)]
    pub title_remove_patterns: Vec<String>,
}

impl SiteConfig {
    /// Collapse whitespace and strip configured noise from a title.
    pub fn clean_title(&self, text: &str) -> String {
        let mut result = text.split_whitespace().collect::<Vec<_>>().join(" ");
        for pattern in &self.title_remove_patterns {
            result = result.replace(pattern, "");
        }
        result.trim().to_string()
    }

    /// Whether a cleaned title should be treated as absent.
    pub fn is_placeholder_title(&self, title: &str) -> bool {
        title.is_empty()
            || self
                .placeholder_titles
                .iter()
                .any(|p| p.eq_ignore_ascii_case(title))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            start_url: defaults::start_url(),
            row_selector: defaults::row_selector(),
            title_selector: defaults::title_selector(),
            timestamp_selector: defaults::timestamp_selector(),
            timestamp_attr: defaults::timestamp_attr(),
            timestamp_scope: TimestampScope::default(),
            next_page_selector: defaults::next_page_selector(),
            placeholder_titles: defaults::placeholder_titles(),
            title_remove_patterns: Vec::new(),
        }
    }
}

/// A client profile the probe runs under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub id: EnvironmentId,

    /// User-Agent header sent by this profile
    pub user_agent: String,

    /// Accept-Language header sent by this profile
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,
}

/// Report and snapshot output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving JSON reports
    #[serde(default = "defaults::report_dir")]
    pub report_dir: String,

    /// Directory receiving diagnostic page snapshots (disabled when unset)
    #[serde(default)]
    pub snapshot_dir: Option<String>,

    /// Print the text report to the console
    #[serde(default = "defaults::console_enabled")]
    pub console_enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: defaults::report_dir(),
            snapshot_dir: None,
            console_enabled: defaults::console_enabled(),
        }
    }
}

mod defaults {
    use super::Environment;
    use crate::models::EnvironmentId;

    // Probe defaults
    pub fn target_count() -> usize {
        100
    }
    pub fn max_pages() -> usize {
        10
    }
    pub fn max_consecutive_errors() -> usize {
        3
    }
    pub fn page_reload_limit() -> usize {
        2
    }
    pub fn timeout_ms() -> u64 {
        30_000
    }
    pub fn page_delay_ms() -> u64 {
        500
    }

    // Site defaults
    pub fn start_url() -> String {
        "https://news.ycombinator.com/newest".into()
    }
    pub fn row_selector() -> String {
        "tr.athing".into()
    }
    pub fn title_selector() -> String {
        ".titleline > a".into()
    }
    pub fn timestamp_selector() -> String {
        "span.age".into()
    }
    pub fn timestamp_attr() -> Option<String> {
        Some("title".into())
    }
    pub fn next_page_selector() -> String {
        "a.morelink".into()
    }
    pub fn placeholder_titles() -> Vec<String> {
        vec!["[deleted]".into(), "[dead]".into(), "[flagged]".into()]
    }

    // Environment defaults
    pub fn accept_language() -> String {
        "en-US,en;q=0.9".into()
    }
    pub fn environments() -> Vec<Environment> {
        vec![
            Environment {
                id: EnvironmentId::from("chromium"),
                user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36"
                    .into(),
                accept_language: accept_language(),
            },
            Environment {
                id: EnvironmentId::from("firefox"),
                user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:131.0) \
                             Gecko/20100101 Firefox/131.0"
                    .into(),
                accept_language: accept_language(),
            },
            Environment {
                id: EnvironmentId::from("webkit"),
                user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.0 Safari/605.1.15"
                    .into(),
                accept_language: accept_language(),
            },
        ]
    }

    // Output defaults
    pub fn report_dir() -> String {
        "reports".into()
    }
    pub fn console_enabled() -> bool {
        true
    }
}

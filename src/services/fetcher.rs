// src/services/fetcher.rs

//! Page fetching capability.
//!
//! The pagination loop only talks to a [`PageFetcher`]. The shipped
//! implementation, [`HttpPageFetcher`], downloads listing pages over HTTP and
//! reads rows with CSS selectors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Environment, EnvironmentId, RawItem, SiteConfig, TimestampScope};
use crate::utils::http;

/// Attempts made to follow a "next page" link.
const NAVIGATION_ATTEMPTS: usize = 2;

/// Consecutive connection failures after which the fetcher gives up.
const MAX_TRANSPORT_FAILURES: usize = 5;

/// Navigation and extraction over one listing.
///
/// `fetch_items` fails as a whole for page-level problems; a row that cannot
/// be read is reported as an inner `Err` without failing the page.
#[async_trait]
pub trait PageFetcher: Send {
    /// Navigate to the first page.
    async fn open(&mut self) -> Result<()>;

    /// Read the rows of the current page.
    async fn fetch_items(&mut self) -> Result<Vec<Result<RawItem>>>;

    /// Reload the current page in place.
    async fn reload(&mut self) -> Result<()>;

    fn has_next_page(&self) -> bool;

    /// Move to the next page; `false` when that is not possible.
    async fn advance_to_next_page(&mut self) -> bool;

    /// Liveness check; `false` means the environment can no longer be driven.
    fn page_is_usable(&self) -> bool;

    /// Best-effort audit artifact of the current page. Never fails.
    async fn capture_diagnostic_snapshot(&mut self, label: &str);

    /// Lower-level network events observed so far.
    fn network_events(&self) -> usize {
        0
    }
}

/// Builds one fetcher per environment.
pub trait FetcherFactory: Send + Sync {
    fn create(&self, environment: &Environment) -> Result<Box<dyn PageFetcher>>;
}

/// Factory for [`HttpPageFetcher`].
pub struct HttpFetcherFactory {
    config: Arc<Config>,
}

impl HttpFetcherFactory {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl FetcherFactory for HttpFetcherFactory {
    fn create(&self, environment: &Environment) -> Result<Box<dyn PageFetcher>> {
        Ok(Box::new(HttpPageFetcher::new(
            Arc::clone(&self.config),
            environment,
        )?))
    }
}

/// Fetches listing pages over HTTP.
pub struct HttpPageFetcher {
    config: Arc<Config>,
    client: Client,
    environment: EnvironmentId,
    current_url: Url,
    body: Option<String>,
    page_number: usize,
    requests: usize,
    transport_failures: usize,
}

impl HttpPageFetcher {
    pub fn new(config: Arc<Config>, environment: &Environment) -> Result<Self> {
        let client = http::create_client(environment, &config.probe)?;
        let current_url = Url::parse(&config.site.start_url)?;

        Ok(Self {
            config,
            client,
            environment: environment.id.clone(),
            current_url,
            body: None,
            page_number: 1,
            requests: 0,
            transport_failures: 0,
        })
    }

    /// Download a page, bounded by the page timeout.
    async fn load(&mut self, url: &Url) -> Result<String> {
        self.requests += 1;
        let client = &self.client;
        let request = async move {
            let response = client.get(url.clone()).send().await?;
            response.error_for_status()?.text().await
        };
        let outcome = tokio::time::timeout(self.config.probe.page_timeout(), request).await;

        match outcome {
            Ok(Ok(body)) => {
                self.transport_failures = 0;
                Ok(body)
            }
            Ok(Err(error)) => {
                if error.is_connect() {
                    self.transport_failures += 1;
                }
                Err(AppError::page_unavailable(self.page_number, error))
            }
            Err(_) => Err(AppError::timeout(
                format!("loading {url}"),
                self.config.probe.page_timeout_ms,
            )),
        }
    }

    fn next_link(&self) -> Option<Url> {
        let body = self.body.as_deref()?;
        match find_next_link(body, &self.config.site, &self.current_url) {
            Ok(link) => link,
            Err(error) => {
                log::warn!("[{}] Could not read next page link: {}", self.environment, error);
                None
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn open(&mut self) -> Result<()> {
        let start = Url::parse(&self.config.site.start_url)?;
        self.current_url = start.clone();
        self.page_number = 1;
        self.body = None;
        self.body = Some(self.load(&start).await?);
        Ok(())
    }

    async fn fetch_items(&mut self) -> Result<Vec<Result<RawItem>>> {
        let body = match self.body.take() {
            Some(body) => body,
            None => {
                let url = self.current_url.clone();
                self.load(&url).await?
            }
        };
        let rows = extract_rows(&body, &self.config.site);
        self.body = Some(body);
        rows
    }

    async fn reload(&mut self) -> Result<()> {
        self.body = None;
        let url = self.current_url.clone();
        self.body = Some(self.load(&url).await?);
        Ok(())
    }

    fn has_next_page(&self) -> bool {
        self.next_link().is_some()
    }

    async fn advance_to_next_page(&mut self) -> bool {
        let Some(next) = self.next_link() else {
            return false;
        };

        for attempt in 1..=NAVIGATION_ATTEMPTS {
            match self.load(&next).await {
                Ok(body) => {
                    self.current_url = next;
                    self.body = Some(body);
                    self.page_number += 1;
                    return true;
                }
                Err(error) => log::warn!(
                    "[{}] Navigation to {} failed (attempt {}/{}): {}",
                    self.environment,
                    next,
                    attempt,
                    NAVIGATION_ATTEMPTS,
                    error
                ),
            }
        }
        false
    }

    fn page_is_usable(&self) -> bool {
        self.transport_failures < MAX_TRANSPORT_FAILURES
    }

    async fn capture_diagnostic_snapshot(&mut self, label: &str) {
        let (Some(dir), Some(body)) = (&self.config.output.snapshot_dir, &self.body) else {
            return;
        };
        let path = PathBuf::from(dir).join(format!("{}-{}.html", self.environment, label));

        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        };
        match written.await {
            Ok(()) => log::debug!("[{}] Snapshot saved to {}", self.environment, path.display()),
            Err(error) => log::warn!(
                "[{}] Snapshot {} could not be written: {}",
                self.environment,
                path.display(),
                error
            ),
        }
    }

    fn network_events(&self) -> usize {
        self.requests
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Read every listing row of an HTML page.
pub fn extract_rows(html: &str, site: &SiteConfig) -> Result<Vec<Result<RawItem>>> {
    let row_sel = parse_selector(&site.row_selector)?;
    let title_sel = parse_selector(&site.title_selector)?;
    let timestamp_sel = parse_selector(&site.timestamp_selector)?;
    let document = Html::parse_document(html);

    let rows: Vec<Result<RawItem>> = document
        .select(&row_sel)
        .enumerate()
        .map(|(index, row)| {
            let started = Instant::now();
            let title_elem = row
                .select(&title_sel)
                .next()
                .ok_or_else(|| AppError::extraction(index + 1, "title element missing"))?;
            let title = site.clean_title(&title_elem.text().collect::<String>());
            let raw_timestamp = read_timestamp(row, &timestamp_sel, site);

            Ok(RawItem {
                title,
                raw_timestamp,
                extraction_duration: started.elapsed(),
            })
        })
        .collect();
    Ok(rows)
}

fn read_timestamp(row: ElementRef<'_>, selector: &Selector, site: &SiteConfig) -> Option<String> {
    let scope = match site.timestamp_scope {
        TimestampScope::Row => row,
        TimestampScope::NextSibling => row.next_siblings().find_map(ElementRef::wrap)?,
    };
    let elem = scope.select(selector).next()?;

    let value = site
        .timestamp_attr
        .as_deref()
        .and_then(|attr| elem.value().attr(attr))
        .map(str::to_string)
        .unwrap_or_else(|| elem.text().collect::<String>());
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Resolve the "next page" link of an HTML page against its URL.
pub fn find_next_link(html: &str, site: &SiteConfig, base: &Url) -> Result<Option<Url>> {
    let next_sel = parse_selector(&site.next_page_selector)?;
    let document = Html::parse_document(html);

    let href = document
        .select(&next_sel)
        .next()
        .and_then(|elem| elem.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());

    match href {
        Some(href) => Ok(Some(base.join(href)?)),
        None => Ok(None),
    }
}

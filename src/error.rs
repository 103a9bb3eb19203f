// src/error.rs

//! Unified error handling for the probe.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A bounded wait ran out
    #[error("Timed out after {timeout_ms}ms while {context}")]
    Timeout { context: String, timeout_ms: u64 },

    /// Page could not be materialized
    #[error("Page {page} unavailable: {message}")]
    PageUnavailable { page: usize, message: String },

    /// Moving to the next page failed
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// A single listing row could not be read
    #[error("Extraction error at row {row}: {message}")]
    Extraction { row: usize, message: String },

    /// The execution environment can no longer be driven
    #[error("Environment unusable: {0}")]
    Unusable(String),
}

/// Error taxonomy recorded in run metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ItemExtraction,
    PageUnavailable,
    Navigation,
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::ItemExtraction => "item_extraction",
            ErrorKind::PageUnavailable => "page_unavailable",
            ErrorKind::Navigation => "navigation",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a timeout error for the given wait.
    pub fn timeout(context: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            context: context.into(),
            timeout_ms,
        }
    }

    /// Create a page-unavailable error.
    pub fn page_unavailable(page: usize, message: impl fmt::Display) -> Self {
        Self::PageUnavailable {
            page,
            message: message.to_string(),
        }
    }

    /// Create a navigation error.
    pub fn navigation(message: impl fmt::Display) -> Self {
        Self::Navigation(message.to_string())
    }

    /// Create a per-row extraction error.
    pub fn extraction(row: usize, message: impl fmt::Display) -> Self {
        Self::Extraction {
            row,
            message: message.to_string(),
        }
    }

    /// Create an unusable-environment error.
    pub fn unusable(message: impl fmt::Display) -> Self {
        Self::Unusable(message.to_string())
    }

    /// Classify this error for the run's error log.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Extraction { .. } => ErrorKind::ItemExtraction,
            AppError::Http(_)
            | AppError::Selector { .. }
            | AppError::Timeout { .. }
            | AppError::PageUnavailable { .. }
            | AppError::Url(_) => ErrorKind::PageUnavailable,
            AppError::Navigation(_) => ErrorKind::Navigation,
            _ => ErrorKind::Fatal,
        }
    }
}

// src/services/timestamp.rs

//! Timestamp normalization.
//!
//! Listing pages mix absolute timestamps (`2025-10-19T12:34:56`) with relative
//! phrases (`3 hours ago`). [`normalize`] maps both onto a UTC instant so
//! adjacent rows can be compared. The reference instant is always passed in,
//! never read from the clock.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use regex::Regex;
use thiserror::Error;

static ABSOLUTE_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}").ok());

static RELATIVE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s+(minute|hour|day)s?\s+ago\s*$").ok()
});

/// The raw value matched no supported timestamp form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized timestamp: '{raw}'")]
pub struct ParseFailure {
    pub raw: String,
}

/// Parse `raw` into a UTC instant, resolving relative phrases against `now`.
pub fn normalize(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseFailure> {
    let trimmed = raw.trim();

    let parsed = if has_absolute_marker(trimmed) {
        parse_absolute(trimmed)
    } else if let Some((amount, unit_secs)) = relative_offset(trimmed) {
        amount
            .checked_mul(unit_secs)
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| now.checked_sub_signed(delta))
    } else {
        parse_generic(trimmed)
    };

    parsed.ok_or_else(|| ParseFailure {
        raw: raw.to_string(),
    })
}

/// Stable textual form; [`normalize`] maps it back to the same instant.
pub fn to_stable_string(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn has_absolute_marker(raw: &str) -> bool {
    ABSOLUTE_MARKER
        .as_ref()
        .is_some_and(|marker| marker.is_match(raw))
}

/// Amount and unit length in seconds of an `N unit(s) ago` phrase.
fn relative_offset(raw: &str) -> Option<(i64, i64)> {
    let caps = RELATIVE.as_ref()?.captures(raw)?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit_secs = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "minute" => 60,
        "hour" => 3_600,
        "day" => 86_400,
        _ => return None,
    };
    Some((amount, unit_secs))
}

fn parse_absolute(raw: &str) -> Option<DateTime<Utc>> {
    // Some listings append an epoch after the ISO value ("2025-10-19T12:34:56 1760877296").
    let token = raw.split_whitespace().next()?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(token, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_generic(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

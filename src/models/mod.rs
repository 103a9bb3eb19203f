// src/models/mod.rs

//! Domain models for the probe.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod item;
mod run;

// Re-export all public types
pub use config::{Config, Environment, OutputConfig, ProbeConfig, SiteConfig, TimestampScope};
pub use item::{EnvironmentId, Item, RawItem};
pub(crate) use run::as_millis;
pub use run::{AbortReason, ErrorEvent, RunMetrics, RunResult, SortingViolation, StopReason, Summary};

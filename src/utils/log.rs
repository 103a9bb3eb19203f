// src/utils/log.rs

//! Console output helpers with server-style formatting.
//!
//! These write straight to stdout for the human-readable report; diagnostic
//! logging goes through the `log` facade instead.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;

/// Whether console output is printed at all
static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn console output on or off.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Prefix a line with a local timestamp.
fn format_line(message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}", timestamp, message)
}

fn emit(message: &str) {
    if enabled() {
        println!("{}", format_line(message));
    }
}

/// Print a plain line.
pub fn line(message: &str) {
    emit(message);
}

/// Print a success line.
pub fn success(message: &str) {
    emit(&format!("✓ {}", message));
}

/// Print a failure line.
pub fn failure(message: &str) {
    emit(&format!("✗ {}", message));
}

pub fn separator() {
    emit(&"─".repeat(60));
}

/// Print a boxed header.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    emit(&border);
    emit(&format!("  {}", title));
    emit(&border);
}

/// Print an indented line.
pub fn sub_item(message: &str) {
    emit(&format!("    {}", message));
}

/// Print a titled block of key/value lines.
pub fn summary(title: &str, items: &[(&str, String)]) {
    if !enabled() {
        return;
    }
    println!();
    emit(&format!("[SUMMARY] {}", title));
    for (key, value) in items {
        emit(&format!("    {}: {}", key, value));
    }
}

//! Utilities module for logging and error handling
//!
//! This module provides:
//! - Structured logging with tracing
//! - Error handling types
//! - Small formatting helpers shared by the CLI and the server

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{Result, ResultExt, WeatherVisionError};
pub use logging::{init_logging, LogConfig, LogLevel, StageTimer};

/// Format a duration in milliseconds in a human-readable way
pub fn format_millis(millis: f64) -> String {
    if millis < 1000.0 {
        format!("{:.1}ms", millis)
    } else {
        format!("{:.2}s", millis / 1000.0)
    }
}

/// Format a probability as a percentage with a progress bar
pub fn format_progress_bar(progress: f64, width: usize) -> String {
    let filled = (progress.clamp(0.0, 1.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        progress * 100.0
    )
}

//! Error Handling Module
//!
//! Defines the error type shared by every stage of the prediction pipeline.
//! Each stage (decode, infer, postprocess) returns its own variant so callers
//! can map failures to a response without string matching.

use thiserror::Error;

/// Main error type for weather recognition operations
#[derive(Error, Debug)]
pub enum WeatherVisionError {
    /// The uploaded bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// The model artifact could not be loaded or prepared
    #[error("Model error: {0}")]
    Model(String),

    /// The forward pass failed or produced unusable outputs
    #[error("Inference error: {0}")]
    Inference(String),

    /// A model output could not be mapped back to a label
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Normalization parameters are malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<image::ImageError> for WeatherVisionError {
    fn from(err: image::ImageError) -> Self {
        WeatherVisionError::ImageDecode(err.to_string())
    }
}

/// Convenience Result type for weather recognition operations
pub type Result<T> = std::result::Result<T, WeatherVisionError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| WeatherVisionError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

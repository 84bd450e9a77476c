//! Inference module for weather prediction
//!
//! This module provides:
//! - The [`Predictor`], which runs preprocessing, the forward pass and decoding
//! - Postprocessing from raw model outputs to labels and physical units

pub mod postprocess;
pub mod predictor;

// Re-export main types for convenience
pub use postprocess::{
    argmax, decode_metrics, decode_weather, denormalize_metrics, resolve_uv_index, UvIndex,
    WeatherMetrics, WeatherOutcome, WeatherProbabilities,
};
pub use predictor::{PredictionResult, Predictor};

//! # Weather Vision
//!
//! Recognizes the weather in a photo and estimates the conditions it was taken
//! in. A single pretrained network with two heads is used:
//!
//! - a categorical distribution over weather classes (clear, cloudy, rain, ...)
//! - five standardized regressions: temperature, humidity, wind speed, UV index
//!   and pressure
//!
//! ## Modules
//!
//! - `preprocessing`: decode, resize and denoise uploads into model tensors
//! - `model`: the model trait, the ONNX implementation and the normalization parameters
//! - `inference`: the predictor and the postprocessing of both heads
//! - `utils`: logging and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use weather_vision::{OutputHeads, Predictor};
//!
//! let predictor = Predictor::from_files(
//!     Path::new("model.onnx"),
//!     Path::new("normalization_params.json"),
//!     OutputHeads::default(),
//! )?;
//! let result = predictor.predict_file(Path::new("sky.jpg"))?;
//! println!("{}", result.weather.predicted_class);
//! ```

pub mod inference;
pub mod model;
pub mod preprocessing;
pub mod utils;

// Re-export commonly used items for convenience
pub use inference::{PredictionResult, Predictor, UvIndex, WeatherMetrics, WeatherOutcome};
pub use model::{
    LabelMapping, NormalizationParameters, OnnxWeatherModel, OutputHeads, RawPrediction,
    WeatherModel,
};
pub use preprocessing::{ImageTensor, PreprocessConfig};
pub use utils::error::{Result, WeatherVisionError};

/// Side length of the square model input
pub const IMAGE_SIZE: u32 = 224;

/// Number of regression outputs
pub const NUM_METRICS: usize = 5;

/// Regression outputs in model order
pub const METRIC_NAMES: [&str; NUM_METRICS] =
    ["temperature", "humidity", "wind_speed", "uv_index", "pressure"];

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

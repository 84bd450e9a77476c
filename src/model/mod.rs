//! Model module
//!
//! - `params`: normalization statistics and label mappings shipped with the model
//! - `onnx`: the production model, an ONNX export executed with tract
//!
//! Everything that can turn an [`ImageTensor`] into raw outputs implements
//! [`WeatherModel`]; the predictor only depends on that trait.

pub mod onnx;
pub mod params;

pub use onnx::{OnnxWeatherModel, OutputHeads};
pub use params::{LabelMapping, NormalizationParameters};

use crate::preprocessing::ImageTensor;
use crate::utils::error::Result;

/// Raw outputs of one forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    /// Categorical distribution over weather classes, indexed by class id
    pub weather_probabilities: Vec<f32>,
    /// Standardized regression outputs, see [`crate::METRIC_NAMES`]
    pub metrics: Vec<f32>,
}

/// A loaded, frozen two-headed model.
///
/// Implementations are shared across request handlers, so `predict` takes
/// `&self` and must be safe to call concurrently.
pub trait WeatherModel: Send + Sync {
    /// Run a single forward pass on a `[1, 224, 224, 3]` tensor
    fn predict(&self, input: &ImageTensor) -> Result<RawPrediction>;

    /// Short description for logs
    fn describe(&self) -> String {
        "weather model".to_string()
    }
}

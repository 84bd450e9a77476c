//! Inference Predictor Module
//!
//! Ties the pipeline together: preprocess the uploaded image, run one forward
//! pass, decode both heads. The predictor owns the model and the normalization
//! parameters for the lifetime of the process and is shared read-only between
//! requests.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use super::postprocess::{decode_metrics, decode_weather, WeatherMetrics, WeatherOutcome};
use crate::model::{NormalizationParameters, OnnxWeatherModel, OutputHeads, WeatherModel};
use crate::preprocessing::{preprocess_image, ImageTensor, PreprocessConfig};
use crate::utils::error::{Result, ResultExt};
use crate::utils::logging::StageTimer;

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Predicted weather class and full distribution
    pub weather: WeatherOutcome,

    /// Physical metrics
    pub metrics: WeatherMetrics,

    /// Forward pass time in milliseconds
    #[serde(skip)]
    pub inference_time_ms: f64,
}

/// Predictor for running the full pipeline with a loaded model
pub struct Predictor {
    model: Box<dyn WeatherModel>,
    params: NormalizationParameters,
    preprocess: PreprocessConfig,
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("model", &self.model.describe())
            .field("weather_classes", &self.params.weather().len())
            .field("preprocess", &self.preprocess)
            .finish()
    }
}

impl Predictor {
    /// Create a predictor with the default preprocessing pipeline
    pub fn new(model: impl WeatherModel + 'static, params: NormalizationParameters) -> Self {
        let gaps = params.uv().gaps();
        if !gaps.is_empty() {
            tracing::warn!(
                "UV mapping has no labels for {:?}; predictions rounding to these values will fail",
                gaps
            );
        }

        Self {
            model: Box::new(model),
            params,
            preprocess: PreprocessConfig::default(),
        }
    }

    /// Load the ONNX model and parameter file from disk.
    ///
    /// `heads` says which graph output is which head; use
    /// `OutputHeads::default()` for the usual weather-then-metrics order.
    pub fn from_files(model_path: &Path, params_path: &Path, heads: OutputHeads) -> Result<Self> {
        let params = NormalizationParameters::load(params_path)?;
        let model = OnnxWeatherModel::load(model_path, heads)?;
        Ok(Self::new(model, params))
    }

    /// Configure preprocessing
    pub fn with_preprocess(mut self, config: PreprocessConfig) -> Self {
        self.preprocess = config;
        self
    }

    pub fn params(&self) -> &NormalizationParameters {
        &self.params
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    pub fn describe_model(&self) -> String {
        self.model.describe()
    }

    /// Predict on raw encoded image bytes
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let mut timer = StageTimer::start();

        let tensor = preprocess_image(bytes, &self.preprocess)?;
        timer.mark("preprocess");

        let result = self.predict_tensor(&tensor)?;
        timer.mark("infer+decode");
        timer.log();

        Ok(result)
    }

    /// Predict on an image from a file path
    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.predict_bytes(&bytes)
    }

    /// Predict on an already preprocessed tensor
    pub fn predict_tensor(&self, tensor: &ImageTensor) -> Result<PredictionResult> {
        let start = Instant::now();
        let raw = self.model.predict(tensor)?;
        let inference_time = start.elapsed();

        let weather = decode_weather(&raw.weather_probabilities, &self.params)?;
        let metrics = decode_metrics(&raw.metrics, &self.params)?;

        tracing::info!(
            "Predicted {} (UV {} {}) in {:.1}ms",
            weather.predicted_class,
            metrics.uv_index.value,
            metrics.uv_index.label,
            inference_time.as_secs_f64() * 1000.0
        );

        Ok(PredictionResult {
            weather,
            metrics,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }
}

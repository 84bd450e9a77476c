//! ONNX model backed by tract
//!
//! The network is trained in Keras and exported to ONNX. It takes a single
//! NHWC `f32` input and has two outputs: the weather softmax and the
//! standardized metrics vector. The graph is optimized once at load time for a
//! fixed `[1, 224, 224, 3]` input and then reused for every request.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tract_onnx::prelude::*;

use super::{RawPrediction, WeatherModel};
use crate::preprocessing::{ImageTensor, CHANNELS};
use crate::utils::error::{Result, WeatherVisionError};
use crate::IMAGE_SIZE;

/// Which graph output holds which head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputHeads {
    pub weather: usize,
    pub metrics: usize,
}

impl Default for OutputHeads {
    fn default() -> Self {
        Self {
            weather: 0,
            metrics: 1,
        }
    }
}

/// Frozen ONNX weather model
pub struct OnnxWeatherModel {
    plan: TypedRunnableModel<TypedModel>,
    heads: OutputHeads,
    input_size: usize,
    source: PathBuf,
}

impl std::fmt::Debug for OnnxWeatherModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxWeatherModel")
            .field("source", &self.source)
            .field("heads", &self.heads)
            .field("input_size", &self.input_size)
            .finish()
    }
}

impl OnnxWeatherModel {
    /// Load a model for the 224×224 input with the given output assignment
    pub fn load(path: &Path, heads: OutputHeads) -> Result<Self> {
        Self::load_with(path, IMAGE_SIZE as usize, heads)
    }

    /// Load a model with an explicit input size and output assignment
    pub fn load_with(path: &Path, input_size: usize, heads: OutputHeads) -> Result<Self> {
        if !path.exists() {
            return Err(WeatherVisionError::Model(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(0, f32::fact([1, input_size, input_size, CHANNELS]).into())
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                WeatherVisionError::Model(format!("failed to load {}: {:#}", path.display(), e))
            })?;

        let outputs = plan.model().outputs.len();
        if heads.weather >= outputs || heads.metrics >= outputs || heads.weather == heads.metrics {
            return Err(WeatherVisionError::Model(format!(
                "model has {} outputs, cannot assign weather head {} and metrics head {}",
                outputs, heads.weather, heads.metrics
            )));
        }

        tracing::info!(
            "Loaded ONNX model from {:?} ({} outputs, input 1x{}x{}x{})",
            path,
            outputs,
            input_size,
            input_size,
            CHANNELS
        );

        Ok(Self {
            plan,
            heads,
            input_size,
            source: path.to_path_buf(),
        })
    }

    fn output(outputs: &TVec<TValue>, index: usize, head: &str) -> Result<Vec<f32>> {
        let value = outputs.get(index).ok_or_else(|| {
            WeatherVisionError::Inference(format!("model produced no output for the {} head", head))
        })?;
        let values = value
            .as_slice::<f32>()
            .map_err(|e| WeatherVisionError::Inference(format!("{} head: {}", head, e)))?;
        Ok(values.to_vec())
    }
}

impl WeatherModel for OnnxWeatherModel {
    fn predict(&self, input: &ImageTensor) -> Result<RawPrediction> {
        let shape = input.shape();
        if shape[1] != self.input_size || shape[2] != self.input_size {
            return Err(WeatherVisionError::InvalidInput(format!(
                "model expects {}x{} input, got {}x{}",
                self.input_size, self.input_size, shape[1], shape[2]
            )));
        }

        let tensor = Tensor::from_shape(&shape, input.as_slice())
            .map_err(|e| WeatherVisionError::Inference(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| WeatherVisionError::Inference(format!("{:#}", e)))?;

        Ok(RawPrediction {
            weather_probabilities: Self::output(&outputs, self.heads.weather, "weather")?,
            metrics: Self::output(&outputs, self.heads.metrics, "metrics")?,
        })
    }

    fn describe(&self) -> String {
        format!("ONNX model {}", self.source.display())
    }
}

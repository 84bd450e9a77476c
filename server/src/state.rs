//! Application state for the weather prediction server
//!
//! Everything here is built once at startup and only read afterwards.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use weather_vision::{OutputHeads, Predictor};

/// Server configuration
#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// ONNX model file
    pub model_path: PathBuf,
    /// Normalization parameter file
    pub params_path: PathBuf,
    /// Which graph output is which head
    pub heads: OutputHeads,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_path: PathBuf::from("model.onnx"),
            params_path: PathBuf::from("normalization_params.json"),
            heads: OutputHeads::default(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Loaded model and parameters
    pub predictor: Arc<Predictor>,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, predictor: Predictor) -> Self {
        Self {
            config,
            predictor: Arc::new(predictor),
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

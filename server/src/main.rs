//! Weather Vision Server
//!
//! HTTP API that runs the weather model on uploaded photos. The model and its
//! normalization parameters are loaded once at startup; a missing or invalid
//! artifact stops the server before it binds.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use weather_vision::utils::logging::{init_logging, LogConfig, LogLevel};
use weather_vision::{OutputHeads, Predictor};

use crate::state::{AppState, ServerConfig};

/// Weather Vision Server
#[derive(Parser, Debug)]
#[command(name = "weather-vision-server")]
#[command(version)]
#[command(about = "HTTP API serving weather predictions from uploaded images")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "WEATHER_VISION_PORT", default_value = "5000")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Path to the ONNX model
    #[arg(long, env = "WEATHER_VISION_MODEL", default_value = "model.onnx")]
    model: PathBuf,

    /// Path to the normalization parameter file
    #[arg(
        long,
        env = "WEATHER_VISION_PARAMS",
        default_value = "normalization_params.json"
    )]
    params: PathBuf,

    /// Graph output holding the weather probabilities
    #[arg(long, env = "WEATHER_VISION_WEATHER_OUTPUT", default_value = "0")]
    weather_output: usize,

    /// Graph output holding the standardized metrics
    #[arg(long, env = "WEATHER_VISION_METRICS_OUTPUT", default_value = "1")]
    metrics_output: usize,

    /// Largest accepted upload in megabytes
    #[arg(long, default_value = "16")]
    max_upload_mb: usize,

    /// Enable debug logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::default().with_level(LogLevel::Debug)
    } else {
        LogConfig::default()
    };
    init_logging(&log_config).map_err(anyhow::Error::msg)?;

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        model_path: cli.model,
        params_path: cli.params,
        heads: OutputHeads {
            weather: cli.weather_output,
            metrics: cli.metrics_output,
        },
        max_upload_bytes: cli.max_upload_mb * 1024 * 1024,
    };

    info!("Weather Vision Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Model:      {:?}", config.model_path);
    info!("  Params:     {:?}", config.params_path);
    info!(
        "  Outputs:    weather={} metrics={}",
        config.heads.weather, config.heads.metrics
    );
    info!("  Log level:  {}", log_config.level);
    info!("  Max upload: {} MB", cli.max_upload_mb);

    let predictor = Predictor::from_files(&config.model_path, &config.params_path, config.heads)
        .context("failed to load model artifacts")?;
    info!(
        "Ready: {} with {} weather classes",
        predictor.describe_model(),
        predictor.params().weather().len()
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config, predictor));
    let app = routes::router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["weather-vision-server"]).unwrap();
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.max_upload_mb, 16);
        assert_eq!(cli.weather_output, 0);
        assert_eq!(cli.metrics_output, 1);
    }

    #[test]
    fn test_cli_output_heads() {
        let cli = Cli::try_parse_from([
            "weather-vision-server",
            "--weather-output",
            "1",
            "--metrics-output",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.weather_output, 1);
        assert_eq!(cli.metrics_output, 0);
    }
}

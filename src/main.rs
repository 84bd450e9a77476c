//! Weather Vision CLI
//!
//! Runs the prediction pipeline on local files and validates the parameter
//! files shipped with a model. The HTTP service lives in the `server` crate.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use weather_vision::utils::logging::{init_logging, LogConfig};
use weather_vision::utils::{format_millis, format_progress_bar};
use weather_vision::{
    NormalizationParameters, OutputHeads, PredictionResult, Predictor, METRIC_NAMES,
};

/// Weather recognition from images
#[derive(Parser, Debug)]
#[command(name = "weather_vision")]
#[command(version)]
#[command(about = "Predict weather conditions from a photo", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full prediction pipeline on a local image
    Predict {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,

        /// Path to the ONNX model
        #[arg(short, long, env = "WEATHER_VISION_MODEL", default_value = "model.onnx")]
        model: PathBuf,

        /// Path to the normalization parameter file
        #[arg(
            short,
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

        /// Print the same JSON body the HTTP API returns
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Validate a normalization parameter file and show its contents
    CheckParams {
        /// Path to the normalization parameter file
        #[arg(
            short,
            long,
            env = "WEATHER_VISION_PARAMS",
            default_value = "normalization_params.json"
        )]
        params: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::quiet()
    };

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Predict {
            image,
            model,
            params,
            weather_output,
            metrics_output,
            json,
        } => {
            let heads = OutputHeads {
                weather: weather_output,
                metrics: metrics_output,
            };
            cmd_predict(&image, &model, &params, heads, json)?
        }

        Commands::CheckParams { params } => cmd_check_params(&params)?,
    }

    Ok(())
}

fn cmd_predict(
    image: &Path,
    model: &Path,
    params: &Path,
    heads: OutputHeads,
    json: bool,
) -> Result<()> {
    info!("Running prediction on {:?}", image);

    let predictor = Predictor::from_files(model, params, heads)?;
    let result = predictor.predict_file(image)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_prediction(image, &result);
    }

    Ok(())
}

fn print_prediction(image: &Path, result: &PredictionResult) {
    println!("{}", "Prediction:".cyan().bold());
    println!("  📷 Image:   {}", image.display());
    println!(
        "  🌤️  Weather: {}",
        result.weather.predicted_class.green().bold()
    );
    println!("  ⏱️  Forward pass: {}", format_millis(result.inference_time_ms));
    println!();

    println!("{}", "Class probabilities:".cyan().bold());
    for (label, probability) in result.weather.probabilities.iter() {
        let line = format!("  {:<16} {}", label, format_progress_bar(probability as f64, 30));
        if label == result.weather.predicted_class {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    println!();

    let metrics = &result.metrics;
    println!("{}", "Conditions:".cyan().bold());
    println!("  🌡️  Temperature: {:.1} °C", metrics.temperature);
    println!("  💧 Humidity:    {:.0} %", metrics.humidity);
    println!("  💨 Wind speed:  {:.0} km/h", metrics.wind_speed);
    println!(
        "  ☀️  UV index:    {} ({})",
        metrics.uv_index.value, metrics.uv_index.label
    );
    println!("  🧭 Pressure:    {:.0} hPa", metrics.pressure);
}

fn cmd_check_params(path: &Path) -> Result<()> {
    let params = match NormalizationParameters::load(path) {
        Ok(params) => params,
        Err(e) => {
            println!("{} {}", "Error:".red(), e);
            return Err(e.into());
        }
    };

    println!("{}", "Normalization:".cyan().bold());
    for (i, name) in METRIC_NAMES.iter().enumerate() {
        println!(
            "  {:<12} mean {:>10.3}  std {:>10.3}",
            name,
            params.mean()[i],
            params.std()[i]
        );
    }
    println!();

    println!(
        "{} ({})",
        "Weather classes:".cyan().bold(),
        params.weather().len()
    );
    for (index, label) in params.weather().iter() {
        println!("  {:>3}  {}", index, label);
    }
    println!();

    println!("{} ({})", "UV buckets:".cyan().bold(), params.uv().len());
    for (index, label) in params.uv().iter() {
        println!("  {:>3}  {}", index, label);
    }

    let gaps = params.uv().gaps();
    if gaps.is_empty() {
        println!();
        println!("{}", "Parameter file is valid.".green());
    } else {
        println!();
        println!(
            "{} UV mapping has no labels for {:?}; predictions rounding to these buckets will fail",
            "Warning:".yellow(),
            gaps
        );
    }

    let weather_gaps = params.weather().gaps();
    if !weather_gaps.is_empty() {
        println!(
            "{} weather mapping skips class indices {:?}",
            "Warning:".yellow(),
            weather_gaps
        );
    }

    Ok(())
}

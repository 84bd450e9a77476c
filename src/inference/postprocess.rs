//! Postprocessing of raw model outputs
//!
//! Maps the weather distribution back to labels and the standardized metrics
//! back to physical units using the normalization parameters shipped with the
//! model.

use serde::{Serialize, Serializer};

use crate::model::params::NormalizationParameters;
use crate::utils::error::{Result, WeatherVisionError};
use crate::NUM_METRICS;

/// Position of the UV index in the metrics vector
pub const UV_INDEX_POSITION: usize = 3;

/// Label → probability pairs in class-index order.
///
/// Serializes as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherProbabilities(Vec<(String, f32)>);

impl WeatherProbabilities {
    pub fn get(&self, label: &str) -> Option<f32> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(l, p)| (l.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().map(|(_, p)| p).sum()
    }
}

impl Serialize for WeatherProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(l, p)| (l, p)))
    }
}

/// Decoded weather head
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherOutcome {
    pub predicted_class: String,
    pub probabilities: WeatherProbabilities,
}

/// UV index bucket and its descriptive label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UvIndex {
    pub value: i64,
    pub label: String,
}

/// Metrics in physical units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherMetrics {
    /// °C
    pub temperature: f64,
    /// %
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
    pub uv_index: UvIndex,
    /// hPa
    pub pressure: f64,
}

/// Index of the largest value; the first one wins on ties and NaN never wins
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, current)| v > current) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Pick the most likely weather class and label the full distribution
pub fn decode_weather(
    probabilities: &[f32],
    params: &NormalizationParameters,
) -> Result<WeatherOutcome> {
    let labelled = probabilities
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            params
                .weather()
                .label(i as i64)
                .map(|label| (label.to_string(), p))
                .ok_or_else(|| {
                    WeatherVisionError::Lookup(format!("no weather label for class index {}", i))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let best = argmax(probabilities).ok_or_else(|| {
        WeatherVisionError::Inference("weather head produced no usable probabilities".to_string())
    })?;

    Ok(WeatherOutcome {
        predicted_class: labelled[best].0.clone(),
        probabilities: WeatherProbabilities(labelled),
    })
}

/// Affine inverse of the training-time standardization
pub fn denormalize_metrics(
    raw: &[f32],
    params: &NormalizationParameters,
) -> Result<[f64; NUM_METRICS]> {
    let raw: [f32; NUM_METRICS] = raw.try_into().map_err(|_| {
        WeatherVisionError::Inference(format!(
            "metrics head produced {} values, expected {}",
            raw.len(),
            NUM_METRICS
        ))
    })?;

    Ok(params.denormalize(&raw.map(f64::from)))
}

/// Round a denormalized UV value, clamp it into the mapping and label it.
///
/// Rounding is half-to-even. Values are clamped to `[0, max bucket]`; a value
/// that lands on a gap in a sparse mapping is a lookup error.
pub fn resolve_uv_index(raw: f64, params: &NormalizationParameters) -> Result<UvIndex> {
    if !raw.is_finite() {
        return Err(WeatherVisionError::Lookup(format!(
            "UV index prediction is not a finite number: {}",
            raw
        )));
    }

    let rounded = raw.round_ties_even();
    let max_bucket = params.max_uv_bucket();
    let value = (rounded.min(max_bucket as f64) as i64).max(0);

    let label = params.uv().label(value).ok_or_else(|| {
        WeatherVisionError::Lookup(format!("no UV label for index {}", value))
    })?;

    Ok(UvIndex {
        value,
        label: label.to_string(),
    })
}

/// Denormalize the metrics head and resolve the UV bucket
pub fn decode_metrics(raw: &[f32], params: &NormalizationParameters) -> Result<WeatherMetrics> {
    let values = denormalize_metrics(raw, params)?;

    Ok(WeatherMetrics {
        temperature: values[0],
        humidity: values[1],
        wind_speed: values[2],
        uv_index: resolve_uv_index(values[UV_INDEX_POSITION], params)?,
        pressure: values[4],
    })
}

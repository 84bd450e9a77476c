//! Normalization parameters and label mappings
//!
//! These are produced alongside the model at training time and loaded once at
//! startup from a JSON file of the form:
//!
//! ```json
//! {
//!   "mean": [20.1, 61.3, 11.8, 4.2, 1012.7],
//!   "std": [7.9, 18.2, 6.4, 2.9, 8.1],
//!   "weather_mapping": {"Clear": 0, "Cloudy": 1, "Rain": 2},
//!   "uv_mapping": {"low": 0, "moderate": 3, "high": 6}
//! }
//! ```
//!
//! The numeric vectors are ordered temperature, humidity, wind speed, UV index,
//! pressure (see [`crate::METRIC_NAMES`]).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::utils::error::{Result, WeatherVisionError};
use crate::NUM_METRICS;

/// On-disk layout of the parameter file
#[derive(Debug, Deserialize)]
struct ParameterFile {
    mean: [f64; NUM_METRICS],
    std: [f64; NUM_METRICS],
    weather_mapping: BTreeMap<String, i64>,
    uv_mapping: BTreeMap<String, i64>,
}

/// Bidirectional lookup between labels and the integers a model emits
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMapping {
    by_label: BTreeMap<String, i64>,
    by_index: BTreeMap<i64, String>,
}

impl LabelMapping {
    /// Build a mapping, rejecting empty mappings and duplicate values.
    ///
    /// `name` only appears in error messages.
    pub fn new(name: &str, entries: BTreeMap<String, i64>) -> Result<Self> {
        if entries.is_empty() {
            return Err(WeatherVisionError::Config(format!(
                "{} must contain at least one label",
                name
            )));
        }

        let mut by_index = BTreeMap::new();
        for (label, &index) in &entries {
            if let Some(existing) = by_index.insert(index, label.clone()) {
                return Err(WeatherVisionError::Config(format!(
                    "{} maps both '{}' and '{}' to {}",
                    name, existing, label, index
                )));
            }
        }

        Ok(Self {
            by_label: entries,
            by_index,
        })
    }

    /// Label for an integer value
    pub fn label(&self, index: i64) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    /// Integer value for a label
    pub fn index(&self, label: &str) -> Option<i64> {
        self.by_label.get(label).copied()
    }

    /// Largest integer value present
    pub fn max_value(&self) -> i64 {
        // Construction guarantees at least one entry.
        self.by_index.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Integers in `[0, max_value]` that have no label
    pub fn gaps(&self) -> Vec<i64> {
        (0..=self.max_value())
            .filter(|i| !self.by_index.contains_key(i))
            .collect()
    }

    /// Entries in ascending value order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.by_index.iter().map(|(i, l)| (*i, l.as_str()))
    }
}

/// Per-dimension statistics and label mappings used to decode model outputs.
///
/// Read-only after construction; share it behind an `Arc` or by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationParameters {
    mean: [f64; NUM_METRICS],
    std: [f64; NUM_METRICS],
    weather: LabelMapping,
    uv: LabelMapping,
}

impl NormalizationParameters {
    pub fn new(
        mean: [f64; NUM_METRICS],
        std: [f64; NUM_METRICS],
        weather_mapping: BTreeMap<String, i64>,
        uv_mapping: BTreeMap<String, i64>,
    ) -> Result<Self> {
        Ok(Self {
            mean,
            std,
            weather: LabelMapping::new("weather_mapping", weather_mapping)?,
            uv: LabelMapping::new("uv_mapping", uv_mapping)?,
        })
    }

    /// Parse parameters from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ParameterFile = serde_json::from_str(json)
            .map_err(|e| WeatherVisionError::Config(format!("invalid parameter file: {}", e)))?;

        Self::new(file.mean, file.std, file.weather_mapping, file.uv_mapping)
    }

    /// Load parameters from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let params = Self::from_json_str(&json)?;

        tracing::debug!(
            "Loaded normalization parameters from {:?}: {} weather classes, {} UV buckets",
            path,
            params.weather.len(),
            params.uv.len()
        );

        Ok(params)
    }

    pub fn mean(&self) -> &[f64; NUM_METRICS] {
        &self.mean
    }

    pub fn std(&self) -> &[f64; NUM_METRICS] {
        &self.std
    }

    pub fn weather(&self) -> &LabelMapping {
        &self.weather
    }

    pub fn uv(&self) -> &LabelMapping {
        &self.uv
    }

    /// Highest UV bucket; rounded UV predictions are clamped to `[0, max_uv_bucket]`
    pub fn max_uv_bucket(&self) -> i64 {
        self.uv.max_value()
    }

    /// Inverse of the training-time standardization: `x * std + mean`
    pub fn denormalize(&self, raw: &[f64; NUM_METRICS]) -> [f64; NUM_METRICS] {
        let mut out = [0.0; NUM_METRICS];
        for (i, value) in out.iter_mut().enumerate() {
            *value = raw[i] * self.std[i] + self.mean[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "mean": [20.0, 50.0, 10.0, 5.0, 1000.0],
        "std": [5.0, 10.0, 2.0, 3.0, 8.0],
        "weather_mapping": {"Clear": 0, "Cloudy": 1, "Rain": 2},
        "uv_mapping": {"low": 0, "moderate": 1, "high": 2}
    }"#;

    fn mapping(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
        entries.iter().map(|(l, i)| (l.to_string(), *i)).collect()
    }

    #[test]
    fn test_parse_parameter_file() {
        let params = NormalizationParameters::from_json_str(SAMPLE).unwrap();

        assert_eq!(params.mean(), &[20.0, 50.0, 10.0, 5.0, 1000.0]);
        assert_eq!(params.weather().len(), 3);
        assert_eq!(params.weather().label(2), Some("Rain"));
        assert_eq!(params.weather().index("Cloudy"), Some(1));
        assert_eq!(params.max_uv_bucket(), 2);
    }

    #[test]
    fn test_wrong_vector_length_is_rejected() {
        let json = SAMPLE.replace("[20.0, 50.0, 10.0, 5.0, 1000.0]", "[20.0, 50.0]");
        let err = NormalizationParameters::from_json_str(&json).unwrap_err();
        assert!(matches!(err, WeatherVisionError::Config(_)));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = NormalizationParameters::from_json_str(r#"{"mean": [0,0,0,0,0]}"#).unwrap_err();
        assert!(matches!(err, WeatherVisionError::Config(_)));
    }

    #[test]
    fn test_duplicate_mapping_values_are_rejected() {
        let err = LabelMapping::new("uv_mapping", mapping(&[("low", 0), ("minimal", 0)]))
            .unwrap_err();
        assert!(err.to_string().contains("uv_mapping"));
    }

    #[test]
    fn test_empty_mapping_is_rejected() {
        assert!(LabelMapping::new("weather_mapping", BTreeMap::new()).is_err());
    }

    #[test]
    fn test_gaps_report_missing_buckets() {
        let dense = LabelMapping::new("uv", mapping(&[("a", 0), ("b", 1), ("c", 2)])).unwrap();
        assert!(dense.gaps().is_empty());

        let sparse = LabelMapping::new("uv", mapping(&[("low", 0), ("mid", 3), ("top", 6)])).unwrap();
        assert_eq!(sparse.gaps(), vec![1, 2, 4, 5]);
        assert_eq!(sparse.max_value(), 6);
    }

    #[test]
    fn test_iter_is_in_value_order() {
        let m = LabelMapping::new("w", mapping(&[("Rain", 2), ("Clear", 0), ("Snow", 1)])).unwrap();
        let labels: Vec<&str> = m.iter().map(|(_, l)| l).collect();
        assert_eq!(labels, vec!["Clear", "Snow", "Rain"]);
    }

    #[test]
    fn test_denormalize_is_affine() {
        let params = NormalizationParameters::from_json_str(SAMPLE).unwrap();
        let raw = [1.0, -0.5, 0.0, 2.0, -1.0];

        let out = params.denormalize(&raw);

        for i in 0..NUM_METRICS {
            assert_eq!(out[i], raw[i] * params.std()[i] + params.mean()[i]);
        }
        assert_eq!(out, [25.0, 45.0, 10.0, 11.0, 992.0]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let params = NormalizationParameters::load(file.path()).unwrap();
        assert_eq!(params.uv().label(1), Some("moderate"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = NormalizationParameters::load(Path::new("/nonexistent/params.json")).unwrap_err();
        assert!(matches!(err, WeatherVisionError::Io(_)));
    }
}

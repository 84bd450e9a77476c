//! Shared fixtures for route tests

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use weather_vision::{
    ImageTensor, NormalizationParameters, PreprocessConfig, Predictor, RawPrediction,
    WeatherModel,
};

use crate::state::{AppState, ServerConfig, SharedState};

const BOUNDARY: &str = "weather-vision-test-boundary";

/// Model that always returns the same outputs
pub struct FixedModel {
    pub weather: Vec<f32>,
    pub metrics: Vec<f32>,
}

impl WeatherModel for FixedModel {
    fn predict(&self, _input: &ImageTensor) -> weather_vision::Result<RawPrediction> {
        Ok(RawPrediction {
            weather_probabilities: self.weather.clone(),
            metrics: self.metrics.clone(),
        })
    }
}

fn mapping<I: IntoIterator<Item = (String, i64)>>(entries: I) -> BTreeMap<String, i64> {
    entries.into_iter().collect()
}

fn weather_mapping() -> BTreeMap<String, i64> {
    mapping(
        [("Clear", 0), ("Cloudy", 1), ("Rain", 2)]
            .into_iter()
            .map(|(l, i)| (l.to_string(), i)),
    )
}

fn state_with(uv: BTreeMap<String, i64>) -> SharedState {
    let params = NormalizationParameters::new(
        [20.0, 50.0, 10.0, 5.0, 1000.0],
        [0.0; 5],
        weather_mapping(),
        uv,
    )
    .unwrap();
    let model = FixedModel {
        weather: vec![0.7, 0.2, 0.1],
        metrics: vec![0.0; 5],
    };
    let predictor = Predictor::new(model, params)
        .with_preprocess(PreprocessConfig::default().without_denoise());

    Arc::new(AppState::new(ServerConfig::default(), predictor))
}

/// State with a dense UV mapping over `0..=11`
pub fn test_state() -> SharedState {
    state_with(mapping((0..=11).map(|i| (format!("uv-{}", i), i))))
}

/// State whose UV mapping has no label for the predicted bucket (5)
pub fn sparse_uv_state() -> SharedState {
    state_with(mapping(
        [("low", 0), ("high", 8)]
            .into_iter()
            .map(|(l, i)| (l.to_string(), i)),
    ))
}

pub fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_fn(32, 24, |x, y| Rgb([x as u8 * 8, y as u8 * 10, 60]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// POST /api/predict with a single file field
pub fn multipart_request(field: &str, payload: &[u8]) -> Request<Body> {
    multipart_part(
        &format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\n\
             Content-Type: application/octet-stream"
        ),
        payload,
    )
}

/// POST /api/predict with a single plain form value
pub fn multipart_text_request(field: &str, value: &str) -> Request<Body> {
    multipart_part(
        &format!("Content-Disposition: form-data; name=\"{field}\""),
        value.as_bytes(),
    )
}

fn multipart_part(headers: &str, payload: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n{headers}\r\n\r\n").as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

//! API error type
//!
//! Every failure leaves the server as `{"error": "<message>"}`. Client
//! mistakes map to 4xx, anything that goes wrong while decoding or running the
//! model maps to 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use weather_vision::WeatherVisionError;

/// Message returned when the upload has no `image` field
pub const MISSING_IMAGE: &str = "No image provided";

#[derive(Error, Debug)]
pub enum ApiError {
    /// The request carried no `image` field
    #[error("{}", MISSING_IMAGE)]
    MissingImage,

    /// The multipart body could not be read
    #[error("{message}")]
    InvalidUpload { status: StatusCode, message: String },

    /// Decoding, inference or postprocessing failed
    #[error(transparent)]
    Prediction(#[from] WeatherVisionError),

    /// The blocking inference task did not complete
    #[error("Prediction task failed: {0}")]
    Worker(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage => StatusCode::BAD_REQUEST,
            ApiError::InvalidUpload { status, .. } => *status,
            ApiError::Prediction(_) | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Prediction failed: {}", self);
        } else {
            warn!("Rejected request ({}): {}", status, self);
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidUpload {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: "too big".to_string()
            }
            .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::from(WeatherVisionError::ImageDecode("bad".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Worker("panicked".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(ApiError::MissingImage.to_string(), MISSING_IMAGE);

        let err = ApiError::from(WeatherVisionError::Lookup("no UV label for index 4".to_string()));
        assert_eq!(err.to_string(), "Lookup error: no UV label for index 4");
    }
}

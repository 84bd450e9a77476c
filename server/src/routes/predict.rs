//! Prediction endpoint

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use tracing::{info_span, warn};
use uuid::Uuid;
use weather_vision::PredictionResult;

use crate::error::ApiError;
use crate::state::SharedState;

/// Multipart field carrying the uploaded image
pub const IMAGE_FIELD: &str = "image";

/// POST /api/predict - Predict weather and conditions for an uploaded image
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    // A body that is not multipart at all simply has no image field.
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Request is not a multipart upload: {}", rejection);
        ApiError::MissingImage
    })?;

    let bytes = read_image_field(&mut multipart)
        .await?
        .ok_or(ApiError::MissingImage)?;

    let span = info_span!("predict", request_id = %Uuid::new_v4(), bytes = bytes.len());
    let predictor = state.predictor.clone();

    let result = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        predictor.predict_bytes(&bytes)
    })
    .await
    .map_err(|e| ApiError::Worker(e.to_string()))??;

    Ok(Json(result))
}

/// Return the contents of the first `image` file part, skipping any other fields.
///
/// A plain form value named `image` is not an upload and is skipped too.
async fn read_image_field(multipart: &mut Multipart) -> Result<Option<Bytes>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload {
            status: e.status(),
            message: e.body_text(),
        })?
    {
        if field.name() == Some(IMAGE_FIELD) && field.file_name().is_some() {
            let data = field.bytes().await.map_err(|e| ApiError::InvalidUpload {
                status: e.status(),
                message: e.body_text(),
            })?;
            return Ok(Some(data));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::routes::router;
    use crate::routes::test_support::{
        multipart_request, multipart_text_request, png_bytes, read_json, sparse_uv_state,
        test_state,
    };

    #[tokio::test]
    async fn test_missing_image_field() {
        let app = router(test_state());

        let response = app
            .oneshot(multipart_request("file", b"whatever"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body, serde_json::json!({"error": "No image provided"}));
    }

    #[tokio::test]
    async fn test_text_field_named_image_is_not_an_upload() {
        let app = router(test_state());

        let response = app
            .oneshot(multipart_text_request("image", "sky.jpg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "No image provided");
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_missing_image() {
        let app = router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "No image provided");
    }

    #[tokio::test]
    async fn test_corrupted_image_is_server_error() {
        let app = router(test_state());

        let response = app
            .oneshot(multipart_request("image", b"\x00\x01 definitely not pixels"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_prediction() {
        let app = router(test_state());

        let response = app
            .oneshot(multipart_request("image", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;

        assert_eq!(body["weather"]["predicted_class"], "Clear");
        let probabilities = body["weather"]["probabilities"].as_object().unwrap();
        assert_eq!(probabilities.len(), 3);
        let total: f64 = probabilities.values().map(|p| p.as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-5);

        let metrics = &body["metrics"];
        assert_eq!(metrics["temperature"], 20.0);
        assert_eq!(metrics["humidity"], 50.0);
        assert_eq!(metrics["wind_speed"], 10.0);
        assert_eq!(metrics["uv_index"]["value"], 5);
        assert_eq!(metrics["uv_index"]["label"], "uv-5");
        assert_eq!(metrics["pressure"], 1000.0);
    }

    #[tokio::test]
    async fn test_uv_gap_is_server_error() {
        let app = router(sparse_uv_state());

        let response = app
            .oneshot(multipart_request("image", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("no UV label for index 5"));
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let app = router(test_state());
        let mut request = multipart_request("image", &png_bytes());
        request
            .headers_mut()
            .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}

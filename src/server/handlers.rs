//! HTTP request handlers.

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::error::ApiError;
use super::AppState;
use crate::models::{ExtractionRequest, ReceiptUpload};

/// Liveness check.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `POST /receipt-extractor/extract-receipt-details`
///
/// Multipart fields: `file` (required), `aiProvider`, `model`.
pub async fn extract_receipt_details(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let request = read_extraction_request(multipart?).await?;
    let record = state.extractor.extract_receipt_details(request).await?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

async fn read_extraction_request(mut multipart: Multipart) -> Result<ExtractionRequest, ApiError> {
    let mut request = ExtractionRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => request.file = Some(read_upload(field).await?),
            "aiProvider" => request.provider = Some(field.text().await?),
            "model" => request.model = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(request)
}

async fn read_upload(field: Field<'_>) -> Result<ReceiptUpload, ApiError> {
    let file_name = field.file_name().unwrap_or("").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await?;
    Ok(ReceiptUpload::new(bytes.to_vec(), mime_type, file_name))
}

/// `GET /receipts/:file_name`: serve a stored receipt image.
pub async fn serve_receipt_image(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .extractor
        .store()
        .image_path(&file_name)
        .ok_or(ApiError::NotFound)?;

    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::NotFound),
        Err(e) => return Err(ApiError::ImageUnreadable(e)),
    };

    let mime = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    Ok(([(header::CONTENT_TYPE, mime)], content).into_response())
}

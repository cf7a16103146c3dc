//! HTTP upload endpoint
//!
//! Decodes a multipart upload into an [`UploadRequest`], runs it through the
//! [`Pipeline`] and maps the outcome onto the JSON contract used by the shop
//! admin frontend.

use crate::models::{UploadErrorResponse, UploadRequest, UploadResponse};
use crate::pipeline::Pipeline;
use crate::Error;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

const FILE_FIELD: &str = "file";

pub fn router(pipeline: Arc<Pipeline>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload_image))
        .route("/api/upload/", post(upload_image))
        .route("/healthz", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(pipeline)
}

async fn health() -> &'static str {
    "ok"
}

async fn upload_image(
    State(pipeline): State<Arc<Pipeline>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::Client {
        status: e.status(),
        message: e.body_text(),
    })?;

    let request = read_upload(&mut multipart).await?;
    let stored = pipeline.ingest(request).await?;

    Ok(Json(UploadResponse {
        success: true,
        url: stored.url,
        filename: stored.storage_key,
    }))
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadRequest, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::Client {
        status: e.status(),
        message: format!("Failed to parse multipart data: {}", e.body_text()),
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let filename = field.file_name().unwrap_or_default().to_string();

        let data = field.bytes().await.map_err(|e| ApiError::Client {
            status: e.status(),
            message: format!("Failed to read upload: {}", e.body_text()),
        })?;

        tracing::debug!(
            filename = %filename,
            content_type = %content_type,
            size = data.len(),
            "Received upload"
        );

        return Ok(UploadRequest::new(data.to_vec(), content_type, filename));
    }

    Err(ApiError::Client {
        status: StatusCode::BAD_REQUEST,
        message: format!("Missing '{}' field", FILE_FIELD),
    })
}

#[derive(Debug)]
pub enum ApiError {
    Client { status: StatusCode, message: String },
    Ingest(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Ingest(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Client { status, message } => {
                tracing::debug!("Client error: {}", message);
                let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "bad_request"
                };
                (status, kind, message)
            }
            ApiError::Ingest(e) => {
                let status = match &e {
                    Error::UnsupportedMediaType(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!("Upload failed: {}", e);
                }
                (status, e.kind(), e.public_message())
            }
        };

        let body = UploadErrorResponse {
            success: false,
            kind: kind.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::router;
    use crate::error::TransferStage;
    use crate::image::MockImageProcessor;
    use crate::models::{UploadErrorResponse, UploadResponse};
    use crate::pipeline::{Pipeline, PipelineServices};
    use crate::storage::MockRemoteStore;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_server(store: MockRemoteStore, max_upload_bytes: usize) -> TestServer {
        let pipeline = Pipeline::with_services(
            PipelineServices {
                transformer: Box::new(MockImageProcessor::new()),
                store: Box::new(store),
            },
            "https://img.test/".to_string(),
            Duration::from_secs(5),
        );
        TestServer::new(router(Arc::new(pipeline), max_upload_bytes)).unwrap()
    }

    fn file_form(data: &[u8], filename: &str, mime: &str) -> MultipartForm {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(data.to_vec())
                .file_name(filename)
                .mime_type(mime),
        )
    }

    #[tokio::test]
    async fn test_upload_success() {
        let store = MockRemoteStore::new();
        let server = test_server(store.clone(), 1024 * 1024);

        let response = server
            .post("/api/upload/")
            .multipart(file_form(b"png-ish", "shot.png", "image/png"))
            .await;

        response.assert_status_ok();
        let body: UploadResponse = response.json();
        assert!(body.success);
        assert!(body.filename.starts_with("img_"));
        assert_eq!(body.url, format!("https://img.test/{}", body.filename));
        assert!(store.get_files().contains_key(&body.filename));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let store = MockRemoteStore::new();
        let server = test_server(store.clone(), 1024 * 1024);

        let response = server
            .post("/api/upload")
            .multipart(file_form(b"hello", "notes.txt", "text/plain"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: UploadErrorResponse = response.json();
        assert!(!body.success);
        assert_eq!(body.kind, "unsupported_media_type");
        assert_eq!(store.get_store_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_store_failure_is_server_error() {
        let store = MockRemoteStore::new().with_failure_at(TransferStage::Connect);
        let server = test_server(store, 1024 * 1024);

        let response = server
            .post("/api/upload")
            .multipart(file_form(b"png-ish", "shot.png", "image/png"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: UploadErrorResponse = response.json();
        assert_eq!(body.kind, "ingestion_failed");
        assert_eq!(body.message, "Upload failed: remote storage connect step failed");
    }

    #[tokio::test]
    async fn test_upload_missing_file_field() {
        let server = test_server(MockRemoteStore::new(), 1024 * 1024);

        let form = MultipartForm::new().add_text("title", "no file here");
        let response = server.post("/api/upload").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: UploadErrorResponse = response.json();
        assert_eq!(body.kind, "bad_request");
    }

    #[tokio::test]
    async fn test_upload_over_limit() {
        let store = MockRemoteStore::new();
        let server = test_server(store.clone(), 64);

        let response = server
            .post("/api/upload")
            .multipart(file_form(&[0u8; 4096], "big.png", "image/png"))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.get_store_count(), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server(MockRemoteStore::new(), 1024);
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("ok");
    }
}

//! Download API handler.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use clipfetch_core::{scratch::CONTENT_TYPE, AcquisitionError, OutputFormat, QualityCeiling};

use crate::state::AppState;

/// Request body for a download
#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    /// Source page URL. Missing and empty are both rejected downstream.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub quality: QualityCeiling,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct DownloadErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(DownloadErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

impl From<AcquisitionError> for DownloadErrorResponse {
    fn from(e: AcquisitionError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

/// Acquire the requested media and stream it back as an attachment.
pub async fn download(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let result = state
        .orchestrator()
        .acquire(&body.url, body.format, body.quality)
        .await;

    let (download, report) = match result {
        Ok(done) => done,
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            warn!(error = %e, status = status.as_u16(), "Download request failed");
            return (status, Json(DownloadErrorResponse::from(e))).into_response();
        }
    };

    info!(
        winner = ?report.winner(),
        size = download.size(),
        file = download.download_name(),
        "Streaming download"
    );

    let size = download.size();
    let disposition = download.content_disposition();
    let stream = match download.into_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to open output: {}", e),
            );
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, size.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

//! HTTP mapping of the service errors.

use crate::catalog::CatalogError;
use crate::pipeline::PipelineError;
use crate::playback::PlaybackError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::metrics;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Catalog(CatalogError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ApiError::Catalog(CatalogError::Store(e)) => {
                error!("Catalog store error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Catalog store error".to_string(),
                )
            }
            ApiError::Catalog(CatalogError::Pipeline(e)) => {
                let status = match e {
                    PipelineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    PipelineError::Resolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    PipelineError::Download(_)
                    | PipelineError::Transcode(_)
                    | PipelineError::Upload { .. } => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string())
            }
            ApiError::Playback(PlaybackError::NotFound) => {
                (StatusCode::NOT_FOUND, "Audio not found".to_string())
            }
            ApiError::Playback(PlaybackError::Unavailable) => {
                (StatusCode::BAD_GATEWAY, "Audio unavailable".to_string())
            }
            ApiError::Playback(PlaybackError::Store(e)) => {
                error!("Catalog store error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Catalog store error".to_string(),
                )
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Catalog(CatalogError::InvalidInput(_)) => "bad_request",
            ApiError::Catalog(CatalogError::Store(_)) => "store",
            ApiError::Catalog(CatalogError::Pipeline(e)) => e.stage(),
            ApiError::Playback(PlaybackError::NotFound) => "not_found",
            ApiError::Playback(PlaybackError::Unavailable) => "upstream",
            ApiError::Playback(PlaybackError::Store(_)) => "store",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            metrics::record_error(self.error_type(), status.as_u16());
        }

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

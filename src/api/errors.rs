use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::batch::BatchError;
use crate::db::store::StoreError;
use crate::services::csv_import::ImportError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    TooManyRequests(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    /// Missing documents and bad path segments are client errors; the rest are internal.
    pub(crate) fn store(err: StoreError, context: &str) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(context_not_found(context)),
            StoreError::InvalidPath(segment) => {
                Self::BadRequest(format!("Invalid identifier: {segment:?}"))
            }
            other => Self::internal(other, context),
        }
    }

    /// Reports how far a chunked write got before it stopped.
    pub(crate) fn batch(err: BatchError, context: &str) -> Self {
        if err.committed == 0 {
            if let StoreError::InvalidPath(_) = &err.source {
                return Self::store(err.source, context);
            }
        }
        tracing::error!(error = %err.source, committed = err.committed, "{context}");
        Self::Internal(format!("{context}; {} operations were committed before the failure", err.committed))
    }
}

fn context_not_found(context: &str) -> String {
    format!("{context}: not found")
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

fn json_error(status: StatusCode, detail: String) -> Response {
    (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response = json_error(StatusCode::UNAUTHORIZED, message.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => json_error(StatusCode::FORBIDDEN, message.to_string()),
            ApiError::BadRequest(message) => json_error(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => json_error(StatusCode::NOT_FOUND, message),
            ApiError::TooManyRequests(message) => {
                json_error(StatusCode::TOO_MANY_REQUESTS, message.to_string())
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

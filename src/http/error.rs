use axum::http::header::CONTENT_RANGE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::StoreError;
use crate::range::RangeError;
use crate::submit::SubmitError;
use crate::upload::StorageError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Storage(StorageError::NotFound(_)) => "not_found",
            Self::Storage(StorageError::OffsetMismatch { .. }) => "offset_mismatch",
            Self::Storage(StorageError::TooLong { .. }) => "upload_too_long",
            Self::Storage(StorageError::Incomplete { .. }) => "upload_incomplete",
            Self::Storage(StorageError::InvalidName(_)) => "invalid_name",
            Self::Storage(_) => "storage_error",
            Self::Submit(SubmitError::NotFound(_) | SubmitError::NoJob(_)) => "not_found",
            Self::Submit(SubmitError::Conflict { .. }) => "conflict",
            Self::Submit(SubmitError::UploadIncomplete(_)) => "upload_incomplete",
            Self::Submit(SubmitError::Pairing(_)) => "pairing_error",
            Self::Submit(SubmitError::Worker(_)) => "worker_error",
            Self::Submit(_) => "submit_error",
            Self::Range(RangeError::NotFound(_)) => "not_found",
            Self::Range(RangeError::Syntax(_)) => "range_syntax",
            Self::Range(RangeError::Unsatisfiable { .. }) => "range_not_satisfiable",
            Self::Range(RangeError::Io(_)) => "io_error",
            Self::Store(StoreError::NotFound(_)) => "not_found",
            Self::Store(StoreError::Invalid(_)) => "invalid_request",
            Self::Store(_) => "store_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::OffsetMismatch { .. } | StorageError::Incomplete { .. } => StatusCode::CONFLICT,
                StorageError::TooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                StorageError::InvalidName(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Submit(e) => match e {
                SubmitError::NotFound(_) | SubmitError::NoJob(_) => StatusCode::NOT_FOUND,
                SubmitError::Conflict { .. } | SubmitError::UploadIncomplete(_) => StatusCode::CONFLICT,
                SubmitError::Pairing(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SubmitError::Worker(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Range(e) => match e {
                RangeError::NotFound(_) => StatusCode::NOT_FOUND,
                RangeError::Syntax(_) => StatusCode::BAD_REQUEST,
                RangeError::Unsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
                RangeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        // tell the client how large the resource is so it can retry with a valid range
        if let Self::Range(RangeError::Unsatisfiable { size, .. }) = &self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                response.headers_mut().insert(CONTENT_RANGE, value);
            }
        }
        response
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

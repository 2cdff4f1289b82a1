//! JSON error responses of the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::blob_store::BlobStoreError;
use crate::user::SettingsError;

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    PayloadTooLarge(String),
    Unprocessable(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request<T: Into<String>>(message: T) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found<T: Into<String>>(message: T) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal<T: Into<String>>(message: T) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::NotFound(m)
            | ApiError::PayloadTooLarge(m)
            | ApiError::Unprocessable(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.into_message(),
            }),
        )
            .into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Background task failed: {}", err))
    }
}

impl From<BlobStoreError> for ApiError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::InvalidName(_) => ApiError::bad_request("Invalid file name."),
            BlobStoreError::Empty => {
                ApiError::bad_request("File upload failed or file is corrupted.")
            }
            BlobStoreError::NotFound(_) => {
                ApiError::not_found("File not found or could not be deleted.")
            }
            BlobStoreError::Io(err) => ApiError::Internal(format!("Media storage error: {}", err)),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::DuplicatePlaylistName(_) | SettingsError::EmptyPlaylistName => {
                ApiError::Unprocessable(err.to_string())
            }
            SettingsError::InvalidAccountName(_) => ApiError::bad_request("Invalid account name."),
            SettingsError::Serialization(_) => {
                ApiError::Internal(format!("Failed to parse settings file: {}", err))
            }
            SettingsError::Io(_) => ApiError::Internal(format!("Failed to access settings: {}", err)),
        }
    }
}

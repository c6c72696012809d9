//! HTTP boundary error mapping (§7.1): wraps `CoreError` into a stable
//! `{code, message}` JSON body with the right status, generalizing the
//! existing `(StatusCode, Json<Value>)` handler-error convention into a
//! proper `IntoResponse` impl.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_core::error::CoreError;

pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message, .. } => ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message),
            CoreError::ExtractionFailed { message, .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message)
            }
            CoreError::UnsupportedFormat { message, .. } => {
                ApiError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format", message)
            }
            CoreError::ProviderTransient { message, .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, "provider_transient", message)
            }
            CoreError::ProviderPermanent { message, .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, "provider_permanent", message)
            }
            CoreError::StoreUnavailable { message } => ApiError::store_unavailable(message),
            CoreError::NotFound { message } => ApiError::not_found(message),
            CoreError::Forbidden { message } => ApiError::forbidden(message),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("resource not found"),
            other => ApiError::store_unavailable(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "code": self.code, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

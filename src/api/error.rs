use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::collector::CollectError;

/// Structured JSON error body returned by all API error responses.
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Unified application error type.
///
/// Implements [`IntoResponse`] so handlers can return `Result<T, AppError>`
/// and axum will convert errors into structured JSON responses with the
/// appropriate HTTP status code.
pub enum AppError {
    /// Database query failed.
    Database(sqlx::Error),
    /// Resource not found (404).
    NotFound,
    /// Input validation failed (400).
    Validation(String),
    /// Internal server error (500).
    Internal(String),
    /// The device (or its transport) returned an error (502).
    Device(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Resource not found".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                e.to_string(),
            ),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::Device(msg) => (StatusCode::BAD_GATEWAY, "device_error", msg),
        };
        (status, Json(ApiErrorBody { code, message })).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound,
            other => AppError::Database(other),
        }
    }
}

impl From<CollectError> for AppError {
    fn from(e: CollectError) -> Self {
        match e {
            CollectError::InvalidDevice(d) => {
                AppError::Validation(format!("invalid device address: {d}"))
            }
            CollectError::Sample(e) => AppError::Device(e.to_string()),
        }
    }
}

impl From<crate::adb::AdbError> for AppError {
    fn from(e: crate::adb::AdbError) -> Self {
        match e {
            crate::adb::AdbError::InvalidDevice(d) => {
                AppError::Validation(format!("invalid device address: {d}"))
            }
            other => AppError::Device(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_app_error_not_found_response() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn test_app_error_validation_response() {
        let response = AppError::Validation("ip is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "validation_error");
        assert_eq!(json["message"], "ip is required");
    }

    #[tokio::test]
    async fn test_app_error_device_response() {
        let response = AppError::Device("device unreachable".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_invalid_device_maps_to_validation() {
        let err: AppError = CollectError::InvalidDevice("bogus".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

//! エラー型定義 (wa-api)

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::handlers::ErrorResponse;

/// wa-api のエラー型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Phone and message are required")]
    MissingFields,

    #[error("WhatsApp client not ready")]
    NotReady,

    #[error("Failed to send message")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<wa_core::Error> for ApiError {
    fn from(err: wa_core::Error) -> Self {
        match err {
            wa_core::Error::NotReady => ApiError::NotReady,
            wa_core::Error::Delivery(cause) => ApiError::Delivery(cause),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields => StatusCode::BAD_REQUEST,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Delivery(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 内部エラーの詳細はクライアントに返さない
        let body = match &self {
            ApiError::Delivery(cause) => ErrorResponse::with_details(self.to_string(), cause.clone()),
            ApiError::Internal(_) => ErrorResponse::new("Internal server error"),
            _ => ErrorResponse::new(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, ApiError>;

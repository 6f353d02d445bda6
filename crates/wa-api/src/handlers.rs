//! HTTP API handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use wa_core::{ChatId, HealthStatus};

use crate::error::{ApiError, Result};
use crate::server::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

/// Send request payload
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Destination phone number (digits, country code first)
    pub phone: Option<String>,
    /// Message text
    pub message: Option<String>,
}

/// Success payload for `/send`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Payload for `/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

/// Generic API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: state.client.health_status(),
    })
}

/// Send a WhatsApp message
pub async fn send_message(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let Json(req) = payload.map_err(|e| {
        debug!("Rejected send body: {}", e);
        ApiError::MissingFields
    })?;

    let (phone, message) = match (req.phone, req.message) {
        (Some(phone), Some(message)) if !phone.is_empty() && !message.is_empty() => {
            (phone, message)
        }
        _ => return Err(ApiError::MissingFields),
    };

    if !state.client.state().is_ready() {
        return Err(ApiError::NotReady);
    }

    state
        .client
        .send(&ChatId::from_phone(&phone), &message)
        .await
        .map_err(|e| {
            error!("WhatsApp Message Error: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(StatusResponse {
        status: "Message sent successfully!".to_string(),
    }))
}

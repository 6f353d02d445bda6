//! Error types for wa-whatsapp

use thiserror::Error;

/// wa-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Browser initialization failed: {0}")]
    Initialization(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Browser not running")]
    NotRunning,
}

impl From<WhatsAppError> for wa_core::Error {
    fn from(err: WhatsAppError) -> Self {
        match err {
            WhatsAppError::Initialization(msg) => wa_core::Error::Initialization(msg),
            other => wa_core::Error::Delivery(other.to_string()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;

//! Error types for wa-core

use thiserror::Error;

/// Main error type for wa-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("WhatsApp client not ready")]
    NotReady,

    #[error("Message delivery failed: {0}")]
    Delivery(String),

    #[error("Client initialization failed: {0}")]
    Initialization(String),

    #[error("Authentication failure: {0}")]
    AuthFailure(String),

    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("Artifact cleanup failed: {0}")]
    ArtifactCleanup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for wa-core
pub type Result<T> = std::result::Result<T, Error>;

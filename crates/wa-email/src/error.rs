//! Error types for wa-email

use thiserror::Error;

/// wa-email error type
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("SMTP configuration error: {0}")]
    SmtpConfig(String),

    #[error("SMTP send error: {0}")]
    SmtpSend(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("QR render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EmailError> for wa_core::Error {
    fn from(err: EmailError) -> Self {
        wa_core::Error::NotificationDelivery(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EmailError>;

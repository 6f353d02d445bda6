//! wa-email: QR code delivery for wa-relay
//!
//! Renders WhatsApp login QR codes and mails them to the operator over SMTP.

pub mod error;
pub mod notifier;
pub mod qr;
pub mod send;

pub use error::{EmailError, Result};
pub use notifier::CredentialNotifier;
pub use send::{EmailSender, MailAttachment, MailRelay, OutgoingMail};

//! Seams between the lifecycle core and its collaborators

use async_trait::async_trait;

use crate::error::Result;
use crate::lifecycle::{ChatId, EventSender};

/// Backend that owns the actual messaging connection
///
/// Implementations push [`crate::LifecycleEvent`]s into the sender passed to
/// [`SessionDriver::initialize`] for as long as the connection lives.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Start the connection; a no-op is acceptable when already running
    async fn initialize(&self, events: EventSender) -> Result<()>;

    /// Deliver one text message. No retry.
    async fn send_text(&self, to: &ChatId, body: &str) -> Result<()>;

    /// Whether the underlying connection (browser) is alive
    fn is_running(&self) -> bool;
}

/// Receives credential challenges (QR payloads)
#[async_trait]
pub trait CredentialSink: Send + Sync {
    async fn on_challenge(&self, payload: String);
}

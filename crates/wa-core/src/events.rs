//! Lifecycle event loop
//!
//! Consumes driver events one at a time, in emission order, and fans them out
//! to the session state machine, the credential sink and the reconnection
//! controller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::driver::CredentialSink;
use crate::lifecycle::{EventReceiver, LifecycleEvent};
use crate::reconnect::ReconnectionController;
use crate::session::SessionClient;

pub struct LifecycleLoop {
    client: Arc<SessionClient>,
    reconnect: ReconnectionController,
    sink: Arc<dyn CredentialSink>,
}

impl LifecycleLoop {
    pub fn new(
        client: Arc<SessionClient>,
        reconnect: ReconnectionController,
        sink: Arc<dyn CredentialSink>,
    ) -> Self {
        Self {
            client,
            reconnect,
            sink,
        }
    }

    /// Run the loop on its own task
    pub fn spawn(self, events: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    /// Process events until every sender is dropped
    pub async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        info!("Lifecycle event channel closed");
    }

    fn handle(&self, event: LifecycleEvent) {
        let state = self.client.apply(&event);

        match event {
            LifecycleEvent::CredentialChallenge(payload) => {
                info!("QR code generated, notifying operator");
                // Notification must not hold up later events
                let sink = Arc::clone(&self.sink);
                tokio::spawn(async move {
                    sink.on_challenge(payload).await;
                });
            }
            LifecycleEvent::Ready { identity } => {
                info!(
                    "WhatsApp client is ready ({})",
                    identity.as_deref().unwrap_or("unknown id")
                );
            }
            LifecycleEvent::Disconnected(reason) => {
                warn!("Client disconnected: {} (state: {})", reason, state);
                self.reconnect.on_disconnect(&reason);
            }
            LifecycleEvent::AuthFailure(message) => {
                error!(
                    "Authentication failure: {}. Clear the session directory and restart to log in again",
                    message
                );
            }
        }
    }
}

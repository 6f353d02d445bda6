//! Reconnection controller
//!
//! Re-initializes the session a fixed delay after a disconnect. At most one
//! attempt is scheduled at any time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::session::SessionClient;

/// Default delay between a disconnect and the reconnection attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct ReconnectionController {
    client: Arc<SessionClient>,
    delay: Duration,
    /// Set while a timer is armed or its `initialize()` is running
    in_flight: Arc<AtomicBool>,
}

impl ReconnectionController {
    pub fn new(client: Arc<SessionClient>, delay: Duration) -> Self {
        Self {
            client,
            delay,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a reconnection attempt is pending
    pub fn is_reconnecting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Handle a disconnect event
    ///
    /// Returns `true` if a new reconnection timer was armed, `false` if one
    /// was already in flight.
    pub fn on_disconnect(&self, reason: &str) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Reconnection already in flight, ignoring disconnect ({})", reason);
            return false;
        }

        info!(
            "Scheduling reconnection in {}s (reason: {})",
            self.delay.as_secs(),
            reason
        );

        let client = Arc::clone(&self.client);
        let in_flight = Arc::clone(&self.in_flight);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match client.initialize().await {
                Ok(()) => info!("Reconnection attempt finished"),
                Err(e) => error!("Reconnection failed: {}", e),
            }

            in_flight.store(false, Ordering::Release);
        });

        true
    }
}

//! Session client: connection state machine in front of a [`SessionDriver`]

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::SessionDriver;
use crate::error::{Error, Result};
use crate::lifecycle::{ChatId, EventSender, HealthStatus, LifecycleEvent, SessionState};

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    identity: Option<String>,
}

/// Owns the session state and gates all calls into the driver
pub struct SessionClient {
    driver: Arc<dyn SessionDriver>,
    events: EventSender,
    inner: RwLock<SessionInner>,
    /// Serializes `initialize()` so concurrent callers share one startup
    init_lock: Mutex<()>,
    startup_timeout: Duration,
}

impl SessionClient {
    /// Create a new session client
    ///
    /// `events` is handed to the driver on every `initialize()`.
    pub fn new(driver: Arc<dyn SessionDriver>, events: EventSender, startup_timeout: Duration) -> Self {
        Self {
            driver,
            events,
            inner: RwLock::new(SessionInner::default()),
            init_lock: Mutex::new(()),
            startup_timeout,
        }
    }

    /// Current connectivity state
    pub fn state(&self) -> SessionState {
        match self.inner.read() {
            Ok(inner) => inner.state,
            Err(poisoned) => poisoned.into_inner().state,
        }
    }

    /// Own WhatsApp id, set once the session is ready
    pub fn identity(&self) -> Option<String> {
        match self.inner.read() {
            Ok(inner) => inner.identity.clone(),
            Err(poisoned) => poisoned.into_inner().identity.clone(),
        }
    }

    /// `connected` iff the state is `Ready`
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::from(self.state())
    }

    /// Start (or restart) the underlying connection
    ///
    /// Returns immediately when the driver is already running. The startup is
    /// bounded by the configured timeout.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;

        if self.driver.is_running() {
            debug!("Session driver already running, skipping initialize");
            return Ok(());
        }

        info!(
            "Initializing WhatsApp client (timeout: {}s)",
            self.startup_timeout.as_secs()
        );

        match tokio::time::timeout(self.startup_timeout, self.driver.initialize(self.events.clone()))
            .await
        {
            Ok(Ok(())) => {
                info!("WhatsApp client initialized");
                Ok(())
            }
            Ok(Err(e @ Error::Initialization(_))) => Err(e),
            Ok(Err(e)) => Err(Error::Initialization(e.to_string())),
            Err(_) => Err(Error::Initialization(format!(
                "startup timed out after {}s",
                self.startup_timeout.as_secs()
            ))),
        }
    }

    /// Send one text message; requires the `Ready` state
    pub async fn send(&self, to: &ChatId, body: &str) -> Result<()> {
        if !self.state().is_ready() {
            return Err(Error::NotReady);
        }

        info!("Sending message to {}: {}", to.phone(), body);

        self.driver.send_text(to, body).await.map_err(|e| match e {
            Error::Delivery(_) => e,
            other => Error::Delivery(other.to_string()),
        })
    }

    /// Apply a lifecycle event to the state machine, returning the new state
    pub fn apply(&self, event: &LifecycleEvent) -> SessionState {
        let mut inner = match self.inner.write() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = inner.state;

        match event {
            LifecycleEvent::CredentialChallenge(_) => {
                if previous == SessionState::Ready {
                    warn!("Credential challenge received while ready, treating as logout");
                    inner.identity = None;
                }
                inner.state = SessionState::AwaitingCredentials;
            }
            LifecycleEvent::Ready { identity } => {
                inner.state = SessionState::Ready;
                inner.identity = identity.clone();
            }
            LifecycleEvent::Disconnected(_) => {
                inner.state = SessionState::Disconnected;
                inner.identity = None;
            }
            LifecycleEvent::AuthFailure(_) => {
                inner.state = SessionState::AuthFailed;
                inner.identity = None;
            }
        }

        if previous != inner.state {
            debug!("Session state: {} -> {}", previous, inner.state);
        }
        inner.state
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::MockDriver;
    use super::*;
    use crate::lifecycle::event_channel;

    fn client_with(driver: Arc<MockDriver>) -> SessionClient {
        let (tx, _rx) = event_channel();
        SessionClient::new(driver, tx, Duration::from_secs(30))
    }

    fn ready() -> LifecycleEvent {
        LifecycleEvent::Ready {
            identity: Some("15550000000@c.us".to_string()),
        }
    }

    #[test]
    fn test_initial_state() {
        let client = client_with(Arc::new(MockDriver::default()));
        assert_eq!(client.state(), SessionState::Uninitialized);
        assert_eq!(client.health_status(), HealthStatus::Disconnected);
        assert!(client.identity().is_none());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let client = client_with(Arc::new(MockDriver::default()));

        let qr = LifecycleEvent::CredentialChallenge("ref-1".to_string());
        assert_eq!(client.apply(&qr), SessionState::AwaitingCredentials);
        // A rotated QR keeps us waiting
        assert_eq!(client.apply(&qr), SessionState::AwaitingCredentials);

        assert_eq!(client.apply(&ready()), SessionState::Ready);
        assert_eq!(client.identity().as_deref(), Some("15550000000@c.us"));
        assert_eq!(client.health_status(), HealthStatus::Connected);

        let dropped = LifecycleEvent::Disconnected("NAVIGATION".to_string());
        assert_eq!(client.apply(&dropped), SessionState::Disconnected);
        assert!(client.identity().is_none());

        assert_eq!(client.apply(&ready()), SessionState::Ready);
    }

    #[test]
    fn test_auth_failure_from_awaiting() {
        let client = client_with(Arc::new(MockDriver::default()));
        client.apply(&LifecycleEvent::CredentialChallenge("ref".to_string()));
        let failed = client.apply(&LifecycleEvent::AuthFailure("QR expired".to_string()));
        assert_eq!(failed, SessionState::AuthFailed);
        assert_eq!(client.health_status(), HealthStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_send_requires_ready() {
        let driver = Arc::new(MockDriver::default());
        let client = client_with(Arc::clone(&driver));

        let err = client
            .send(&ChatId::from_phone("15551234567"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotReady));
        assert_eq!(driver.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_send_when_ready() {
        let driver = Arc::new(MockDriver::default());
        let client = client_with(Arc::clone(&driver));
        client.apply(&ready());

        client
            .send(&ChatId::from_phone("15551234567"), "hello")
            .await
            .unwrap();
        assert_eq!(driver.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_is_delivery_error() {
        let driver = Arc::new(MockDriver::default());
        driver.fail_send.store(true, Ordering::SeqCst);
        let client = client_with(Arc::clone(&driver));
        client.apply(&ready());

        let err = client
            .send(&ChatId::from_phone("15551234567"), "hello")
            .await
            .unwrap_err();
        match err {
            Error::Delivery(cause) => assert!(cause.contains("send button not found")),
            other => panic!("unexpected error: {:?}", other),
        }
        // Exactly one attempt
        assert_eq!(driver.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_initialize_skips_running_driver() {
        let driver = Arc::new(MockDriver::default());
        driver.running.store(true, Ordering::SeqCst);
        let client = client_with(Arc::clone(&driver));

        client.initialize().await.unwrap();
        assert_eq!(driver.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_initialize_failure() {
        let driver = Arc::new(MockDriver::default());
        driver.fail_init.store(true, Ordering::SeqCst);
        let client = client_with(Arc::clone(&driver));

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_times_out() {
        let driver = Arc::new(MockDriver {
            init_delay: Some(Duration::from_secs(120)),
            ..Default::default()
        });
        let client = client_with(Arc::clone(&driver));

        let err = client.initialize().await.unwrap_err();
        match err {
            Error::Initialization(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

//! WhatsApp Web session driver
//!
//! Owns the browser, runs the page monitor thread and implements
//! [`SessionDriver`] for the core session client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use wa_core::{ChatId, EventSender, SessionDriver};

use crate::browser::{BrowserConfig, BrowserSession};
use crate::error::WhatsAppError;
use crate::observer::PageObserver;

/// Interval between page probes
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct DriverShared {
    session: Mutex<Option<Arc<BrowserSession>>>,
    running: AtomicBool,
    /// Bumped on every launch and on shutdown; stale monitors exit
    generation: AtomicU64,
    /// One tab: held by a send for its whole navigation, and by each probe
    tab_lock: tokio::sync::Mutex<()>,
}

impl DriverShared {
    fn current(&self) -> Option<Arc<BrowserSession>> {
        match self.session.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, session: Option<Arc<BrowserSession>>) -> Option<Arc<BrowserSession>> {
        let mut slot = match self.session.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *slot, session)
    }

    /// Run `f` unless a send currently owns the tab
    fn with_idle_tab<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let _tab = self.tab_lock.try_lock().ok()?;
        Some(f())
    }
}

/// [`SessionDriver`] backed by WhatsApp Web in headless Chrome
pub struct WhatsAppWebDriver {
    config: BrowserConfig,
    shared: Arc<DriverShared>,
    qr_reload_limit: u32,
}

impl WhatsAppWebDriver {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            shared: Arc::new(DriverShared::default()),
            qr_reload_limit: 0,
        }
    }

    /// Report an auth failure after `limit` expired QR codes (0: reload forever)
    pub fn with_qr_reload_limit(mut self, limit: u32) -> Self {
        self.qr_reload_limit = limit;
        self
    }

    /// Close the browser and stop the monitor
    pub fn shutdown(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.running.store(false, Ordering::SeqCst);
        if self.shared.replace(None).is_some() {
            info!("WhatsApp Web driver shut down");
        }
    }
}

#[async_trait]
impl SessionDriver for WhatsAppWebDriver {
    async fn initialize(&self, events: EventSender) -> wa_core::Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || BrowserSession::launch(config))
            .await
            .map_err(|e| WhatsAppError::Initialization(format!("Launch task failed: {}", e)))??;
        let session = Arc::new(session);

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.replace(Some(Arc::clone(&session)));
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let reload_limit = self.qr_reload_limit;
        std::thread::Builder::new()
            .name("wa-monitor".to_string())
            .spawn(move || monitor(session, shared, generation, reload_limit, events))
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                WhatsAppError::Initialization(format!("Failed to start monitor: {}", e))
            })?;

        Ok(())
    }

    async fn send_text(&self, to: &ChatId, body: &str) -> wa_core::Result<()> {
        let _tab = self.shared.tab_lock.lock().await;
        let session = self.shared.current().ok_or(WhatsAppError::NotRunning)?;

        let phone = to.phone().to_string();
        let body = body.to_string();
        tokio::task::spawn_blocking(move || session.send_text(&phone, &body))
            .await
            .map_err(|e| WhatsAppError::Interaction(format!("Send task failed: {}", e)))??;

        debug!("Message delivered to {}", to);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

/// Probe the page until the browser goes away or a newer session replaces it
fn monitor(
    session: Arc<BrowserSession>,
    shared: Arc<DriverShared>,
    generation: u64,
    reload_limit: u32,
    events: EventSender,
) {
    let mut observer = PageObserver::with_reload_limit(reload_limit);

    while shared.generation.load(Ordering::SeqCst) == generation {
        // A send navigates the tab; probing mid-navigation would read as a failure
        let observed = shared.with_idle_tab(|| {
            let observed = observer.observe(session.probe());
            if observer.take_reload_request() {
                if let Err(e) = session.reload_qr() {
                    warn!("{}", e);
                }
            }
            observed
        });

        for event in observed.unwrap_or_default() {
            debug!("Page event: {}", event.kind());
            if events.send(event).is_err() {
                debug!("Lifecycle channel closed, stopping monitor");
                return;
            }
        }

        if observer.is_closed() {
            error!("WhatsApp Web tab is gone");
            if shared
                .generation
                .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                shared.running.store(false, Ordering::SeqCst);
                shared.replace(None);
            }
            return;
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    debug!("Monitor for session generation {} stopped", generation);
}

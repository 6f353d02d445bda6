//! Page probing for WhatsApp Web
//!
//! The monitor thread evaluates [`PROBE_SCRIPT`] once per tick; the
//! [`PageObserver`] turns the resulting sequence of [`PageProbe`]s into
//! lifecycle events and tells the monitor when to reload an expired QR code.

use serde::Deserialize;
use wa_core::LifecycleEvent;

/// Returns a JSON string describing what the WhatsApp Web page shows
pub const PROBE_SCRIPT: &str = r#"(() => {
  if (document.querySelector('#pane-side')) {
    let wid = null;
    try {
      wid = JSON.parse(localStorage.getItem('last-wid-md') || localStorage.getItem('last-wid') || 'null');
    } catch (e) {}
    return JSON.stringify({ state: 'ready', wid: typeof wid === 'string' ? wid : null });
  }
  const qr = document.querySelector('div[data-ref]');
  if (qr) {
    if (qr.querySelector('button') || qr.querySelector('span[data-icon="refresh-large"]')) {
      return JSON.stringify({ state: 'qr_expired' });
    }
    return JSON.stringify({ state: 'qr', ref: qr.getAttribute('data-ref') });
  }
  return JSON.stringify({ state: 'loading' });
})()"#;

/// Disconnect reason when the QR screen replaces the chat list
pub const REASON_LOGOUT: &str = "LOGOUT";
/// Disconnect reason when the tab or browser went away
pub const REASON_NAVIGATION: &str = "NAVIGATION";

/// One observation of the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageProbe {
    /// Chat list visible
    Ready { wid: Option<String> },
    /// Login QR visible with its payload
    Qr { reference: String },
    /// QR stopped rotating and asks for a manual reload
    QrExpired,
    /// Startup screen, syncing, or anything unrecognized
    Loading,
    /// Probe failed; repeated failures mean the tab or browser is gone
    Gone(String),
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    state: String,
    #[serde(rename = "ref")]
    reference: Option<String>,
    wid: Option<String>,
}

impl PageProbe {
    /// Parse the string returned by [`PROBE_SCRIPT`]
    pub fn parse(raw: &str) -> Self {
        let Ok(probe) = serde_json::from_str::<RawProbe>(raw) else {
            return PageProbe::Loading;
        };

        match probe.state.as_str() {
            "ready" => PageProbe::Ready {
                wid: probe.wid.as_deref().map(normalize_wid),
            },
            "qr" => match probe.reference {
                Some(reference) if !reference.is_empty() => PageProbe::Qr { reference },
                _ => PageProbe::Loading,
            },
            "qr_expired" => PageProbe::QrExpired,
            _ => PageProbe::Loading,
        }
    }
}

/// Drop the multi-device suffix: `1555:12@c.us` -> `1555@c.us`
fn normalize_wid(wid: &str) -> String {
    match (wid.split_once(':'), wid.split_once('@')) {
        (Some((user, _)), Some((_, server))) => format!("{}@{}", user, server),
        _ => wid.to_string(),
    }
}

/// Consecutive failed probes before the tab counts as gone
pub const MAX_PROBE_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Starting,
    Awaiting {
        last_ref: String,
    },
    Ready,
    Failed,
    Closed,
}

/// Turns page probes into lifecycle events
#[derive(Debug, Default)]
pub struct PageObserver {
    phase: Phase,
    /// Expired codes reloaded since the last login; reset on ready
    reloads: u32,
    /// 0 reloads forever
    reload_limit: u32,
    reload_requested: bool,
    probe_failures: u32,
}

impl PageObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up with an auth failure after `limit` expired codes (0: never)
    pub fn with_reload_limit(limit: u32) -> Self {
        Self {
            reload_limit: limit,
            ..Self::default()
        }
    }

    /// The browser is gone and nothing further will be observed
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Whether the caller should click the QR reload button; clears the request
    pub fn take_reload_request(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }

    pub fn observe(&mut self, probe: PageProbe) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();

        if !matches!(probe, PageProbe::Gone(_)) {
            self.probe_failures = 0;
        }

        match probe {
            PageProbe::Loading => {}
            PageProbe::Qr { reference } => {
                if let Phase::Awaiting { last_ref } = &self.phase {
                    if *last_ref == reference {
                        return events;
                    }
                }
                if self.phase == Phase::Ready {
                    events.push(LifecycleEvent::Disconnected(REASON_LOGOUT.to_string()));
                }
                if self.phase != Phase::Closed {
                    events.push(LifecycleEvent::CredentialChallenge(reference.clone()));
                    self.phase = Phase::Awaiting { last_ref: reference };
                }
            }
            PageProbe::QrExpired => {
                if let Phase::Awaiting { last_ref } = &mut self.phase {
                    if last_ref.is_empty() {
                        // Reload already asked for; click again, count once
                        self.reload_requested = true;
                    } else if self.reload_limit > 0 && self.reloads >= self.reload_limit {
                        events.push(LifecycleEvent::AuthFailure(format!(
                            "QR code expired {} times without being scanned",
                            self.reloads + 1
                        )));
                        self.phase = Phase::Failed;
                    } else {
                        // Forget the old code so the reloaded one is mailed
                        last_ref.clear();
                        self.reloads += 1;
                        self.reload_requested = true;
                    }
                }
            }
            PageProbe::Ready { wid } => {
                self.reloads = 0;
                self.reload_requested = false;
                if !matches!(self.phase, Phase::Ready | Phase::Closed) {
                    events.push(LifecycleEvent::Ready { identity: wid });
                    self.phase = Phase::Ready;
                }
            }
            PageProbe::Gone(_) => {
                self.probe_failures += 1;
                if self.probe_failures < MAX_PROBE_FAILURES {
                    return events;
                }
                match self.phase {
                    Phase::Starting | Phase::Awaiting { .. } | Phase::Ready => {
                        events.push(LifecycleEvent::Disconnected(REASON_NAVIGATION.to_string()));
                    }
                    Phase::Failed | Phase::Closed => {}
                }
                self.phase = Phase::Closed;
            }
        }

        events
    }
}

//! Lifecycle types shared by the session driver, the event loop and the API

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

/// Connectivity state of the WhatsApp session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// `initialize()` has never completed
    #[default]
    Uninitialized,
    /// A QR code is on screen and waiting to be scanned
    AwaitingCredentials,
    /// Logged in and able to send
    Ready,
    /// Connection dropped after being ready
    Disconnected,
    /// Credentials were rejected; needs an operator
    AuthFailed,
}

impl SessionState {
    pub fn is_ready(self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::AwaitingCredentials => "awaiting_credentials",
            SessionState::Ready => "ready",
            SessionState::Disconnected => "disconnected",
            SessionState::AuthFailed => "auth_failed",
        };
        f.write_str(name)
    }
}

/// Value reported by `GET /health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Connected,
    Disconnected,
}

impl From<SessionState> for HealthStatus {
    fn from(state: SessionState) -> Self {
        if state.is_ready() {
            HealthStatus::Connected
        } else {
            HealthStatus::Disconnected
        }
    }
}

/// Events emitted by a session driver, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A new login QR code payload
    CredentialChallenge(String),
    /// Session authenticated; `identity` is the own WhatsApp id when known
    Ready { identity: Option<String> },
    /// Connection lost, with a reason code such as `LOGOUT` or `NAVIGATION`
    Disconnected(String),
    /// Credentials were not accepted
    AuthFailure(String),
}

impl LifecycleEvent {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::CredentialChallenge(_) => "qr",
            LifecycleEvent::Ready { .. } => "ready",
            LifecycleEvent::Disconnected(_) => "disconnected",
            LifecycleEvent::AuthFailure(_) => "auth_failure",
        }
    }
}

/// Sending half of the lifecycle event channel handed to drivers
pub type EventSender = mpsc::UnboundedSender<LifecycleEvent>;

/// Receiving half consumed by the lifecycle loop
pub type EventReceiver = mpsc::UnboundedReceiver<LifecycleEvent>;

/// Create a lifecycle event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Individual chat id (`<phone>@c.us`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId(String);

impl ChatId {
    const USER_SUFFIX: &'static str = "@c.us";

    /// Build a chat id from a phone number as given by the caller
    pub fn from_phone(phone: &str) -> Self {
        Self(format!("{}{}", phone.trim(), Self::USER_SUFFIX))
    }

    /// The phone part, without the `@c.us` suffix
    pub fn phone(&self) -> &str {
        self.0.strip_suffix(Self::USER_SUFFIX).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_from_state() {
        let states = [
            SessionState::Uninitialized,
            SessionState::AwaitingCredentials,
            SessionState::Ready,
            SessionState::Disconnected,
            SessionState::AuthFailed,
        ];
        for state in states {
            let expected = if state == SessionState::Ready {
                HealthStatus::Connected
            } else {
                HealthStatus::Disconnected
            };
            assert_eq!(HealthStatus::from(state), expected, "state {}", state);
        }
    }

    #[test]
    fn test_health_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
    }

    #[test]
    fn test_chat_id_from_phone() {
        let id = ChatId::from_phone("15551234567");
        assert_eq!(id.as_str(), "15551234567@c.us");
        assert_eq!(id.phone(), "15551234567");
    }

    #[test]
    fn test_chat_id_trims_whitespace() {
        let id = ChatId::from_phone(" 15551234567 ");
        assert_eq!(id.to_string(), "15551234567@c.us");
    }
}

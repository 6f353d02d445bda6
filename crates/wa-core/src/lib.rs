//! wa-core: WhatsApp relay core library
//!
//! Session lifecycle state machine, reconnection controller, lifecycle
//! event loop and configuration shared by the relay crates.

pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod reconnect;
pub mod session;

pub use config::{Config, EmailConfig, LogConfig, RunMode, ServerConfig, WhatsAppConfig};
pub use driver::{CredentialSink, SessionDriver};
pub use error::{Error, Result};
pub use events::LifecycleLoop;
pub use lifecycle::{
    ChatId, EventReceiver, EventSender, HealthStatus, LifecycleEvent, SessionState, event_channel,
};
pub use reconnect::{DEFAULT_RECONNECT_DELAY, ReconnectionController};
pub use session::SessionClient;

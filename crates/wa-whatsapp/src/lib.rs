//! wa-whatsapp: WhatsApp Web session driver for wa-relay
//!
//! Drives WhatsApp Web in headless Chrome. The login is kept in a persistent
//! Chrome profile, the page is probed once per second for QR / ready /
//! logout transitions, and messages are sent through the `send?phone=`
//! deep link.

pub mod browser;
pub mod client;
pub mod error;
pub mod observer;

pub use browser::{BrowserConfig, BrowserConfigBuilder, BrowserSession};
pub use client::WhatsAppWebDriver;
pub use error::{Result, WhatsAppError};
pub use observer::{PageObserver, PageProbe};

//! Browser session for WhatsApp Web
//!
//! Launches Chrome with a persistent profile so the WhatsApp login survives
//! restarts, and wraps the few tab operations the driver needs.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use tracing::{debug, info};
use wa_core::WhatsAppConfig;

use crate::error::{Result, WhatsAppError};
use crate::observer::{PROBE_SCRIPT, PageProbe};

pub const WHATSAPP_WEB_URL: &str = "https://web.whatsapp.com";

/// WhatsApp Web refuses the default `HeadlessChrome` user agent
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const SEND_BUTTON: &str = r#"span[data-icon="send"]"#;
const QR_RELOAD_BUTTON: &str =
    r#"div[data-ref] button, div[data-ref] span[data-icon="refresh-large"]"#;
const PENDING_SCRIPT: &str = r#"!!document.querySelector('span[data-icon="msg-time"]')"#;

/// Browser launch configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Whether to run in headless mode
    pub headless: bool,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout: u64,
    /// Element wait timeout in seconds
    pub element_timeout: u64,
    /// User agent presented to WhatsApp Web
    pub user_agent: String,
    /// Chrome profile directory (persists the login)
    pub user_data_dir: Option<PathBuf>,
    /// Explicit Chrome binary; auto-detected when unset
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1280,
            height: 900,
            navigation_timeout: 30,
            element_timeout: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            user_data_dir: None,
            chrome_path: None,
        }
    }
}

impl BrowserConfig {
    /// Create a new configuration builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }

    /// Derive the browser settings from the relay configuration
    pub fn from_whatsapp_config(config: &WhatsAppConfig) -> Self {
        Self::builder()
            .headless(config.headless)
            .navigation_timeout(config.startup_timeout_secs)
            .user_data_dir(config.session_dir.clone())
            .chrome_path(config.chrome_path.clone())
            .build()
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn navigation_timeout(mut self, seconds: u64) -> Self {
        self.config.navigation_timeout = seconds;
        self
    }

    pub fn element_timeout(mut self, seconds: u64) -> Self {
        self.config.element_timeout = seconds;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.user_data_dir = Some(dir.into());
        self
    }

    pub fn chrome_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.chrome_path = path;
        self
    }

    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// A running Chrome instance with WhatsApp Web open in one tab
pub struct BrowserSession {
    // Dropping the browser kills the Chrome process
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    config: BrowserConfig,
}

impl BrowserSession {
    /// Launch Chrome and open WhatsApp Web (blocking)
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        info!("Launching browser (headless: {})", config.headless);

        if let Some(ref dir) = config.user_data_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                WhatsAppError::Initialization(format!(
                    "Failed to create session dir {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let args: Vec<String> = vec![
            format!("--window-size={},{}", config.width, config.height),
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--user-agent={}", config.user_agent),
        ];
        let os_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptionsBuilder::default()
            .headless(config.headless)
            .sandbox(false)
            .path(config.chrome_path.clone())
            .user_data_dir(config.user_data_dir.clone())
            // The monitor probes every second; never let the browser idle out
            .idle_browser_timeout(Duration::from_secs(60 * 60 * 24 * 365))
            .args(os_args)
            .build()
            .map_err(|e| {
                WhatsAppError::Initialization(format!("Failed to build launch options: {}", e))
            })?;

        let browser = Browser::new(launch_options).map_err(|e| {
            WhatsAppError::Initialization(format!("Failed to launch browser: {}", e))
        })?;

        let tab = browser.new_tab().map_err(|e| {
            WhatsAppError::Initialization(format!("Failed to open tab: {}", e))
        })?;
        tab.set_default_timeout(Duration::from_secs(config.navigation_timeout));

        tab.navigate_to(WHATSAPP_WEB_URL)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| {
                WhatsAppError::Initialization(format!("Failed to open {}: {}", WHATSAPP_WEB_URL, e))
            })?;

        info!("WhatsApp Web opened");

        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    /// Evaluate the page probe (blocking)
    pub fn probe(&self) -> PageProbe {
        match self.tab.evaluate(PROBE_SCRIPT, false) {
            Ok(result) => match result.value {
                Some(serde_json::Value::String(raw)) => PageProbe::parse(&raw),
                _ => PageProbe::Loading,
            },
            Err(e) => PageProbe::Gone(e.to_string()),
        }
    }

    /// Click the reload button of an expired QR code (blocking)
    pub fn reload_qr(&self) -> Result<()> {
        self.tab
            .find_element(QR_RELOAD_BUTTON)
            .map_err(|e| WhatsAppError::ElementNotFound(format!("QR reload button: {}", e)))?
            .click()
            .map_err(|e| WhatsAppError::Interaction(format!("Failed to reload QR code: {}", e)))?;

        info!("QR code expired, requested a new one");
        Ok(())
    }

    /// Send `body` to `phone` through the `send?phone=` deep link (blocking)
    pub fn send_text(&self, phone: &str, body: &str) -> Result<()> {
        let url = send_url(phone, body)?;
        let element_timeout = Duration::from_secs(self.config.element_timeout);

        debug!("Opening chat for {}", phone);

        self.tab
            .navigate_to(url.as_str())
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| WhatsAppError::Navigation(format!("Failed to open chat: {}", e)))?;

        self.tab
            .wait_for_element_with_custom_timeout(SEND_BUTTON, element_timeout)
            .map_err(|e| {
                WhatsAppError::ElementNotFound(format!(
                    "Send button not found (invalid number?): {}",
                    e
                ))
            })?
            .click()
            .map_err(|e| WhatsAppError::Interaction(format!("Failed to click send: {}", e)))?;

        self.wait_until_sent(element_timeout)
    }

    /// Wait for the clock icon on the outgoing message to go away
    fn wait_until_sent(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        // Give the message bubble time to appear
        std::thread::sleep(Duration::from_millis(500));

        loop {
            let pending = self
                .tab
                .evaluate(PENDING_SCRIPT, false)
                .map_err(|e| WhatsAppError::Interaction(format!("Failed to check status: {}", e)))?
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            if !pending {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(WhatsAppError::Timeout(
                    "Message still pending after send".to_string(),
                ));
            }
            std::thread::sleep(Duration::from_millis(250));
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        info!("Closing browser session");
    }
}

/// Build the deep link that opens a chat with `body` pre-filled
pub fn send_url(phone: &str, body: &str) -> Result<url::Url> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(WhatsAppError::Navigation(format!(
            "Invalid phone number: {}",
            phone
        )));
    }

    let base = format!("{}/send", WHATSAPP_WEB_URL);
    url::Url::parse_with_params(&base, &[("phone", digits.as_str()), ("text", body)])
        .map_err(|e| WhatsAppError::Navigation(format!("Invalid send URL: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_default() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert!(config.user_data_dir.is_none());
        assert!(!config.user_agent.contains("Headless"));
    }

    #[test]
    fn test_browser_config_builder() {
        let config = BrowserConfig::builder()
            .headless(false)
            .window_size(1024, 768)
            .element_timeout(5)
            .user_agent("Custom Agent")
            .user_data_dir("sessions")
            .build();

        assert!(!config.headless);
        assert_eq!(config.width, 1024);
        assert_eq!(config.height, 768);
        assert_eq!(config.element_timeout, 5);
        assert_eq!(config.user_agent, "Custom Agent");
        assert_eq!(config.user_data_dir, Some(PathBuf::from("sessions")));
    }

    #[test]
    fn test_from_whatsapp_config() {
        let wa = WhatsAppConfig {
            headless: false,
            startup_timeout_secs: 45,
            chrome_path: Some(PathBuf::from("/usr/bin/chromium")),
            ..Default::default()
        };
        let config = BrowserConfig::from_whatsapp_config(&wa);
        assert!(!config.headless);
        assert_eq!(config.navigation_timeout, 45);
        assert_eq!(config.user_data_dir, Some(PathBuf::from("sessions")));
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn test_send_url_encodes_text() {
        let url = send_url("+1 555-123-4567", "hello world & more").unwrap();
        assert_eq!(url.path(), "/send");
        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("phone".to_string(), "15551234567".to_string()),
                ("text".to_string(), "hello world & more".to_string()),
            ]
        );
    }

    #[test]
    fn test_send_url_rejects_empty_phone() {
        assert!(send_url("abc", "hi").is_err());
    }
}

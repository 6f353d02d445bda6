//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. wa-relay.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::Error;

/// Default config file name looked up in the working directory
pub const CONFIG_FILE: &str = "wa-relay.toml";

/// Runtime mode; production disables console logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => RunMode::Production,
            _ => RunMode::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == RunMode::Production
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port
    pub port: u16,
    /// Runtime mode
    pub mode: RunMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: RunMode::default(),
        }
    }
}

/// Mail relay configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP user, also used as sender address
    pub user: String,
    /// SMTP secret (app password)
    pub password: String,
    /// Operator address; defaults to the sender
    pub to: Option<String>,
    /// SMTP relay host
    pub smtp_host: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            to: None,
            smtp_host: default_smtp_host(),
        }
    }
}

impl EmailConfig {
    /// Address that receives QR codes
    pub fn recipient(&self) -> &str {
        self.to.as_deref().unwrap_or(&self.user)
    }
}

/// WhatsApp Web session configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Chrome profile directory holding the persisted login
    pub session_dir: PathBuf,
    /// Where the QR image is rendered before mailing
    pub qr_path: PathBuf,
    /// Explicit Chrome/Chromium binary
    pub chrome_path: Option<PathBuf>,
    /// Run the browser headless
    pub headless: bool,
    /// Browser startup timeout in seconds
    pub startup_timeout_secs: u64,
    /// Delay before reconnecting in seconds
    pub reconnect_delay_secs: u64,
    /// Expired QR codes to reload before giving up; 0 reloads forever
    pub qr_max_reloads: u32,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::from("sessions"),
            qr_path: PathBuf::from("qrcode.png"),
            chrome_path: None,
            headless: true,
            startup_timeout_secs: default_startup_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
            qr_max_reloads: 0,
        }
    }
}

impl WhatsAppConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Log file configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for `combined.log` and `error.log`
    pub dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

/// Main configuration for wa-relay
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub email: EmailConfig,
    pub whatsapp: WhatsAppConfig,
    pub log: LogConfig,
}

/// 実行モードを環境変数から決める
///
/// `APP_ENV` を優先し、なければ `NODE_ENV` を見る（既存の `.env` 互換）。
fn run_mode_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<RunMode> {
    lookup("APP_ENV")
        .or_else(|| lookup("NODE_ENV"))
        .map(|mode| RunMode::parse(&mode))
}

fn default_port() -> u16 {
    5000
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_startup_timeout() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    5
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./wa-relay.toml` があればそれを使い、なければ環境変数のみ。
    pub fn load() -> crate::Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Self::from_env()
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 環境変数が設定されていればファイルの値より優先されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::parse_toml(&content)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// TOML 文字列を解析する（環境変数による上書きはしない）
    fn parse_toml(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        let server = toml.server.unwrap_or_default();
        let email = toml.email.unwrap_or_default();
        let whatsapp = toml.whatsapp.unwrap_or_default();
        let log = toml.log.unwrap_or_default();

        let wa_defaults = WhatsAppConfig::default();

        Ok(Config {
            server: ServerConfig {
                port: server.port.unwrap_or_else(default_port),
                mode: server
                    .env
                    .as_deref()
                    .map(RunMode::parse)
                    .unwrap_or_default(),
            },
            email: EmailConfig {
                user: email.user.unwrap_or_default(),
                password: email.password.unwrap_or_default(),
                to: email.to.filter(|s| !s.is_empty()),
                smtp_host: email.smtp_host.unwrap_or_else(default_smtp_host),
            },
            whatsapp: WhatsAppConfig {
                session_dir: whatsapp.session_dir.unwrap_or(wa_defaults.session_dir),
                qr_path: whatsapp.qr_path.unwrap_or(wa_defaults.qr_path),
                chrome_path: whatsapp.chrome_path,
                headless: whatsapp.headless.unwrap_or(true),
                startup_timeout_secs: whatsapp
                    .startup_timeout_secs
                    .unwrap_or_else(default_startup_timeout),
                reconnect_delay_secs: whatsapp
                    .reconnect_delay_secs
                    .unwrap_or_else(default_reconnect_delay),
                qr_max_reloads: whatsapp.qr_max_reloads.unwrap_or_default(),
            },
            log: LogConfig {
                dir: log.dir.unwrap_or_else(|| PathBuf::from(".")),
            },
        })
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        // Server 設定の上書き
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(mode) = run_mode_from_env(|key| std::env::var(key).ok()) {
            self.server.mode = mode;
        }

        // Email 設定の上書き
        if let Ok(user) = std::env::var("EMAIL_HOST_USER") {
            self.email.user = user;
        }
        if let Ok(password) = std::env::var("EMAIL_HOST_PASSWORD") {
            self.email.password = password;
        }
        if let Ok(to) = std::env::var("EMAIL_TO") {
            if !to.is_empty() {
                self.email.to = Some(to);
            }
        }
        if let Ok(host) = std::env::var("SMTP_HOST") {
            if !host.is_empty() {
                self.email.smtp_host = host;
            }
        }

        // WhatsApp 設定の上書き
        if let Ok(dir) = std::env::var("SESSION_DIR") {
            self.whatsapp.session_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("QR_PATH") {
            self.whatsapp.qr_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("CHROME_PATH") {
            if !path.is_empty() {
                self.whatsapp.chrome_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(headless) = std::env::var("HEADLESS") {
            self.whatsapp.headless = headless.to_lowercase() != "false";
        }
        if let Ok(secs) = std::env::var("STARTUP_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                self.whatsapp.startup_timeout_secs = s;
            }
        }
        if let Ok(secs) = std::env::var("RECONNECT_DELAY_SECS") {
            if let Ok(s) = secs.parse() {
                self.whatsapp.reconnect_delay_secs = s;
            }
        }
        if let Ok(max) = std::env::var("QR_MAX_RELOADS") {
            if let Ok(n) = max.parse() {
                self.whatsapp.qr_max_reloads = n;
            }
        }

        // Log 設定の上書き
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.log.dir = PathBuf::from(dir);
        }
    }

    /// 必須項目を確認する
    fn validate(&self) -> crate::Result<()> {
        if self.email.user.is_empty() {
            return Err(Error::Config("EMAIL_HOST_USER not set".to_string()));
        }
        if self.email.password.is_empty() {
            return Err(Error::Config("EMAIL_HOST_PASSWORD not set".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// TOML 構造体定義（ファイル解析用）
// ============================================================================

/// TOML ファイル用のトップレベル構造
#[derive(Debug, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    email: Option<TomlEmailConfig>,
    whatsapp: Option<TomlWhatsAppConfig>,
    log: Option<TomlLogConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    /// ポート番号
    port: Option<u16>,
    /// 実行モード ("production" でコンソール出力なし)
    env: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlEmailConfig {
    user: Option<String>,
    password: Option<String>,
    to: Option<String>,
    smtp_host: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlWhatsAppConfig {
    session_dir: Option<PathBuf>,
    qr_path: Option<PathBuf>,
    chrome_path: Option<PathBuf>,
    headless: Option<bool>,
    startup_timeout_secs: Option<u64>,
    reconnect_delay_secs: Option<u64>,
    qr_max_reloads: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlLogConfig {
    /// ログファイルのディレクトリ
    dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.mode, RunMode::Development);
        assert_eq!(config.email.smtp_host, "smtp.gmail.com");
        assert_eq!(config.whatsapp.session_dir, PathBuf::from("sessions"));
        assert_eq!(config.whatsapp.qr_path, PathBuf::from("qrcode.png"));
        assert_eq!(config.whatsapp.startup_timeout(), Duration::from_secs(30));
        assert_eq!(config.whatsapp.reconnect_delay(), Duration::from_secs(5));
        assert!(config.whatsapp.headless);
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!(RunMode::parse("production"), RunMode::Production);
        assert_eq!(RunMode::parse(" Production "), RunMode::Production);
        assert_eq!(RunMode::parse("development"), RunMode::Development);
        assert_eq!(RunMode::parse(""), RunMode::Development);
        assert!(RunMode::Production.is_production());
    }

    #[test]
    fn test_recipient_defaults_to_sender() {
        let mut email = EmailConfig {
            user: "bot@example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(email.recipient(), "bot@example.com");

        email.to = Some("ops@example.com".to_string());
        assert_eq!(email.recipient(), "ops@example.com");
    }

    #[test]
    fn test_validate_requires_mail_credentials() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.email.user = "bot@example.com".to_string();
        assert!(config.validate().is_err());

        config.email.password = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        // テスト用環境変数を設定
        unsafe {
            std::env::set_var("WA_RELAY_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${WA_RELAY_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        // 存在しない環境変数
        let result = Config::expand_env_vars("prefix_${WA_RELAY_NONEXISTENT}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("WA_RELAY_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        assert_eq!(Config::expand_env_vars("cost: $5"), "cost: $5");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[server]
port = 8080
env = "production"

[email]
user = "bot@example.com"
password = "app-password"
to = "ops@example.com"

[whatsapp]
session_dir = "/var/lib/wa-relay/sessions"
qr_path = "/tmp/qr.png"
headless = false
startup_timeout_secs = 60
reconnect_delay_secs = 10
qr_max_reloads = 3

[log]
dir = "/var/log/wa-relay"
"#;

        let config = Config::parse_toml(toml_content).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.server.mode.is_production());
        assert_eq!(config.email.user, "bot@example.com");
        assert_eq!(config.email.recipient(), "ops@example.com");
        assert_eq!(config.email.smtp_host, "smtp.gmail.com");
        assert_eq!(
            config.whatsapp.session_dir,
            PathBuf::from("/var/lib/wa-relay/sessions")
        );
        assert_eq!(config.whatsapp.qr_path, PathBuf::from("/tmp/qr.png"));
        assert!(!config.whatsapp.headless);
        assert_eq!(config.whatsapp.startup_timeout_secs, 60);
        assert_eq!(config.whatsapp.reconnect_delay_secs, 10);
        assert_eq!(config.whatsapp.qr_max_reloads, 3);
        assert_eq!(config.log.dir, PathBuf::from("/var/log/wa-relay"));
    }

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_run_mode_from_env_falls_back_to_node_env() {
        assert_eq!(
            run_mode_from_env(env(&[("NODE_ENV", "production")])),
            Some(RunMode::Production)
        );
        assert_eq!(
            run_mode_from_env(env(&[("APP_ENV", "development"), ("NODE_ENV", "production")])),
            Some(RunMode::Development)
        );
        assert_eq!(run_mode_from_env(env(&[])), None);
    }

    #[test]
    fn test_toml_empty_uses_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.server.port, 5000);
        assert!(config.email.to.is_none());
        assert!(config.whatsapp.chrome_path.is_none());
    }

    #[test]
    fn test_toml_invalid() {
        let err = Config::parse_toml("[server]\nport = \"abc\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

//! Configuration for the yago client.
//!
//! Settings are read from `.yago/yago.toml` and layered as
//! file → environment (including `.env`) → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! url = "ws://127.0.0.1:8000/ws/{session}"
//!
//! [connection]
//! connect_timeout_secs = 10
//! heartbeat_interval_secs = 30   # 0 disables heartbeats
//! idle_timeout_secs = 90
//! probe_on_connect = true
//!
//! [reconnect]
//! enabled = true
//! max_attempts = 5
//! initial_delay_ms = 500
//! max_delay_ms = 30000
//!
//! [session]
//! max_log_entries = 0            # 0 keeps every log line
//! ui = "full"
//!
//! [logging]
//! file = ".yago/logs/yago.log"
//! ```
//!
//! Environment overrides: `YAGO_BACKEND_URL`, `YAGO_CONNECT_TIMEOUT_SECS`,
//! `YAGO_MAX_RECONNECTS`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::channel::connector::SESSION_PLACEHOLDER;
use crate::channel::{ConnectionSettings, ReconnectPolicy};
use crate::ui::UiMode;

pub const CONFIG_DIR: &str = ".yago";
pub const CONFIG_FILE: &str = "yago.toml";

pub const ENV_BACKEND_URL: &str = "YAGO_BACKEND_URL";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "YAGO_CONNECT_TIMEOUT_SECS";
pub const ENV_MAX_RECONNECTS: &str = "YAGO_MAX_RECONNECTS";

/// Backend endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    /// Live endpoint template; `{session}` is replaced by the session id
    #[serde(default = "default_backend_url")]
    pub url: String,
}

fn default_backend_url() -> String {
    format!("ws://127.0.0.1:8000/ws/{}", SESSION_PLACEHOLDER)
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
        }
    }
}

/// Per-connection timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSection {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds between heartbeat pings (0 disables)
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence before a connection counts as lost
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Ping once right after connecting
    #[serde(default = "default_probe_on_connect")]
    pub probe_on_connect: bool,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_probe_on_connect() -> bool {
    true
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            probe_on_connect: default_probe_on_connect(),
        }
    }
}

/// Reconnect backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSection {
    #[serde(default = "default_reconnect_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            enabled: default_reconnect_enabled(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Session view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Log lines kept in the view model (0 keeps all)
    #[serde(default)]
    pub max_log_entries: usize,
    /// Default UI mode: full, minimal or json
    #[serde(default = "default_ui")]
    pub ui: String,
}

fn default_ui() -> String {
    "full".to_string()
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_log_entries: 0,
            ui: default_ui(),
        }
    }
}

/// Diagnostic logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Also write logs to this file (relative paths resolve against the project dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// The complete yago.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct YagoToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl YagoToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse yago.toml")
    }

    /// Load `yago.toml` from `yago_dir`, or defaults if it does not exist.
    pub fn load_or_default(yago_dir: &Path) -> Result<Self> {
        let config_path = yago_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize yago.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Backend URL template, with environment fallback over the file value.
    pub fn backend_url(&self) -> String {
        std::env::var(ENV_BACKEND_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.backend.url.clone())
    }

    /// Log cap for the view model; `None` means unbounded.
    pub fn max_log_entries(&self) -> Option<usize> {
        Some(self.session.max_log_entries).filter(|n| *n > 0)
    }

    /// Transport settings, with environment overrides applied.
    pub fn connection_settings(&self) -> ConnectionSettings {
        let connect_timeout_secs = env_parse::<u64>(ENV_CONNECT_TIMEOUT_SECS)
            .unwrap_or(self.connection.connect_timeout_secs);
        let max_attempts =
            env_parse::<u32>(ENV_MAX_RECONNECTS).unwrap_or(self.reconnect.max_attempts);
        let heartbeat = self.connection.heartbeat_interval_secs;

        ConnectionSettings {
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            heartbeat_interval: (heartbeat > 0).then(|| Duration::from_secs(heartbeat)),
            idle_timeout: Duration::from_secs(self.connection.idle_timeout_secs),
            probe_on_connect: self.connection.probe_on_connect,
            reconnect: ReconnectPolicy {
                enabled: self.reconnect.enabled,
                max_attempts,
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            },
        }
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = url_warnings(&self.backend.url);
        warnings.extend(self.validate_settings());
        warnings
    }

    /// Warnings for everything except the backend URL.
    fn validate_settings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.connection.connect_timeout_secs == 0 {
            warnings.push("connection.connect_timeout_secs is 0; every connect attempt will time out".to_string());
        }
        let heartbeat = self.connection.heartbeat_interval_secs;
        if heartbeat > 0 && self.connection.idle_timeout_secs <= heartbeat {
            warnings.push(format!(
                "connection.idle_timeout_secs ({}) should be larger than heartbeat_interval_secs ({})",
                self.connection.idle_timeout_secs, heartbeat
            ));
        }
        if self.reconnect.enabled && self.reconnect.max_attempts == 0 {
            warnings.push("reconnect.max_attempts is 0; reconnect is effectively disabled".to_string());
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            warnings.push(format!(
                "reconnect.initial_delay_ms ({}) exceeds max_delay_ms ({})",
                self.reconnect.initial_delay_ms, self.reconnect.max_delay_ms
            ));
        }
        if !matches!(
            self.session.ui.to_lowercase().as_str(),
            "full" | "minimal" | "json"
        ) {
            warnings.push(format!(
                "Invalid session.ui '{}': expected full, minimal or json",
                self.session.ui
            ));
        }

        warnings
    }
}

fn url_warnings(url: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        warnings.push(format!(
            "backend.url '{}' should start with ws:// or wss://",
            url
        ));
    }
    if !url.contains(SESSION_PLACEHOLDER) {
        warnings.push(format!(
            "backend.url '{}' has no {} placeholder; the session id will be appended as the last path segment",
            url, SESSION_PLACEHOLDER
        ));
    }
    warnings
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

/// Resolved configuration.
///
/// It merges settings from:
/// 1. yago.toml file
/// 2. Environment variables (and `.env` in the project directory)
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct YagoConfig {
    pub project_dir: PathBuf,
    pub yago_dir: PathBuf,
    pub toml: YagoToml,
    pub verbose: bool,
    /// CLI override for the backend URL template
    pub cli_url: Option<String>,
    /// CLI override for the UI mode
    pub cli_ui: Option<UiMode>,
}

impl YagoConfig {
    /// Load configuration for `project_dir`.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let _ = dotenvy::from_path(project_dir.join(".env"));
        let yago_dir = project_dir.join(CONFIG_DIR);
        let toml = YagoToml::load_or_default(&yago_dir)?;

        Ok(Self {
            project_dir,
            yago_dir,
            toml,
            verbose: false,
            cli_url: None,
            cli_ui: None,
        })
    }

    /// Load configuration with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        url: Option<String>,
        ui: Option<UiMode>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_url = url;
        config.cli_ui = ui;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.yago_dir.join(CONFIG_FILE)
    }

    /// Backend URL template (CLI → env → file → default).
    pub fn backend_url(&self) -> String {
        self.cli_url
            .clone()
            .unwrap_or_else(|| self.toml.backend_url())
    }

    /// UI mode (CLI → file).
    pub fn ui_mode(&self) -> UiMode {
        self.cli_ui
            .unwrap_or_else(|| UiMode::parse(&self.toml.session.ui))
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        self.toml.connection_settings()
    }

    pub fn max_log_entries(&self) -> Option<usize> {
        self.toml.max_log_entries()
    }

    /// Log file from the config, resolved against the project directory.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.toml.logging.file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                self.project_dir.join(file)
            }
        })
    }

    /// Validate configuration and return warnings.
    /// Warnings for the effective configuration: the URL checked is the one
    /// `backend_url()` resolves to, not necessarily the file's.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = url_warnings(&self.backend_url());
        warnings.extend(self.toml.validate_settings());
        warnings
    }
}

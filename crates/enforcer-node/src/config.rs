//! Service configuration.
//!
//! Settings are layered: an optional YAML file, then environment variables
//! prefixed with `ENFORCER` using `__` as the section separator, e.g.
//! `ENFORCER__GITLAB__PERSONAL_ACCESS_TOKEN`.

use crate::observability::LogFormat;
use enforcer_client::ClientConfig;
use enforcer_core::RuleConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ENFORCER";

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "enforcer.yaml";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A source could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    /// The merged settings are inconsistent.
    #[error("invalid settings: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Top-level service settings.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Settings {
    /// Remote instance access.
    #[validate(nested)]
    pub gitlab: GitLabSettings,
    /// Dispatcher settings.
    #[serde(default)]
    #[validate(nested)]
    pub enforcer: EnforcerSettings,
    /// Periodic full scans.
    #[serde(default)]
    #[validate(nested)]
    pub scheduler: SchedulerSettings,
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerSettings,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Rules, applied in this order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Remote instance access.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct GitLabSettings {
    /// Instance base URL, e.g. `https://gitlab.example.com`.
    #[validate(url)]
    pub server_url: String,
    /// Token sent in the `PRIVATE-TOKEN` header.
    #[validate(length(min = 1))]
    pub personal_access_token: String,
    /// Page size for list calls.
    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 100))]
    pub per_page: u32,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// Optional HTTP proxy.
    #[serde(default)]
    #[validate(nested)]
    pub proxy: ProxySettings,
}

/// HTTP proxy. Disabled when `host` is unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_proxy"))]
pub struct ProxySettings {
    /// Proxy host name.
    pub host: Option<String>,
    /// Proxy port, required with `host`.
    pub port: Option<u16>,
}

impl ProxySettings {
    /// Proxy URL, if one is configured.
    pub fn url(&self) -> Option<String> {
        match (self.host.as_deref().map(str::trim), self.port) {
            (Some(host), Some(port)) if !host.is_empty() => Some(format!("http://{host}:{port}")),
            _ => None,
        }
    }
}

fn validate_proxy(proxy: &ProxySettings) -> Result<(), ValidationError> {
    let has_host = proxy.host.as_deref().is_some_and(|h| !h.trim().is_empty());
    if has_host && proxy.port.is_none() {
        return Err(ValidationError::new("proxy_port_required"));
    }
    Ok(())
}

/// Dispatcher settings.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EnforcerSettings {
    /// Shared secret expected in `X-Gitlab-Token`.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub system_hook_token: String,
    /// Audit entries kept in memory.
    #[serde(default = "default_audit_capacity")]
    #[validate(range(min = 1))]
    pub audit_capacity: usize,
}

impl Default for EnforcerSettings {
    fn default() -> Self {
        Self {
            system_hook_token: String::new(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

/// Periodic full scans.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SchedulerSettings {
    /// Whether the scheduler runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scan starts.
    #[serde(default = "default_interval_secs")]
    #[validate(range(min = 1))]
    pub interval_secs: u64,
    /// Seconds to wait before the first scan.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    /// Address the hook endpoint binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Log output.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Level for the `enforcer` crates.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_per_page() -> u32 {
    enforcer_client::pagination::DEFAULT_PER_PAGE
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_audit_capacity() -> usize {
    enforcer_audit::audit::DEFAULT_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_initial_delay_secs() -> u64 {
    60
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from `path` (optional unless given explicitly) and the
    /// environment, then validate them.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Client configuration for the remote instance.
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(
            self.gitlab.server_url.clone(),
            self.gitlab.personal_access_token.clone(),
        );
        client.per_page = self.gitlab.per_page;
        client.timeout = Duration::from_secs(self.gitlab.timeout_secs);
        client.proxy = self.gitlab.proxy.url();
        client
    }
}

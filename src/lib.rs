//! Config Toolkit
//!
//! Client for a layered configuration service:
//! - Named profiles in a server-maintained order; earlier profiles win
//! - Per-profile properties, resolved into an effective view by the service
//! - A notification bus that surfaces every failed request to listeners
//! - A gateway whose operations never fail with an error, only report and return `Outcome::Failed`

pub mod events;
pub mod gateway;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use events::{BusError, Level, Notification, NotificationBus};
pub use gateway::{ConfigGateway, Failure, Outcome};

/// Default location of the optional YAML config file
pub const DEFAULT_CONFIG_FILE: &str = "toolkit.yaml";

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,config_toolkit=debug";

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub service: ServiceYamlConfig,
}

/// Remote service section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceYamlConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for ServiceYamlConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8881/api".into(),
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Service base URL; request paths are appended to it
    pub base_url: String,
    /// Per-request timeout. Expiry is reported as a connectivity failure.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let yaml = ServiceYamlConfig::default();
        Self {
            base_url: yaml.url,
            timeout_secs: yaml.timeout_secs,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries `toolkit.yaml` in CWD. A missing or
    /// unparsable file falls back to defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let timeout_secs = match std::env::var("TOOLKIT_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("TOOLKIT_TIMEOUT_SECS must be a number, got {raw:?}"))?,
            Err(_) => yaml.service.timeout_secs,
        };

        Ok(Self {
            base_url: std::env::var("TOOLKIT_API_URL").unwrap_or(yaml.service.url),
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let path = yaml_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Shared application state: one bus, one gateway publishing on it
#[derive(Clone, Debug)]
pub struct AppState {
    pub bus: NotificationBus,
    pub gateway: ConfigGateway,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Wire a gateway over HTTP to the configured service
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let transport = gateway::HttpTransport::from_config(&config)
            .context("Failed to build HTTP client")?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Wire a gateway over any transport (e.g. `MockConfigService`)
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn gateway::Transport>) -> Self {
        let bus = NotificationBus::new();
        let gateway = ConfigGateway::new(transport, bus.clone());
        Self {
            bus,
            gateway,
            config: Arc::new(config),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Application configuration loading and validation.
//!
//! Configuration comes from a TOML file. The hub token is the exception:
//! it is read from the `HF_TOKEN` environment variable (a `.env` file
//! works too) and never from the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::assets::{AssetSource, AssetSpec};
use crate::error::{ConfigError, Result};

/// Default hub that asset URLs resolve against.
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub hub: HubConfig,

    /// Directory that relative asset paths resolve against.
    #[serde(default)]
    pub assets_root: Option<PathBuf>,

    /// Artifacts that must be on disk before the service starts.
    #[serde(default, rename = "asset")]
    pub assets: Vec<AssetSpec>,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub handoff: HandoffConfig,

    /// Path to the status file for external monitoring.
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the global tracing subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured level.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => fmt().json().with_env_filter(filter).init(),
            _ => fmt().with_env_filter(filter).init(),
        }
    }
}

/// Hub access configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Base URL remote files resolve against.
    pub base_url: String,
    /// Retry rounds across the transport ladder, per file.
    pub retry_rounds: u32,
    /// Fixed delay between retry rounds, in seconds.
    pub retry_backoff_secs: u64,
    /// Bearer token for gated repositories. Populated from `HF_TOKEN`,
    /// never from the file.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HUB_URL.into(),
            retry_rounds: 3,
            retry_backoff_secs: 5,
            token: None,
        }
    }
}

/// Inference service launch configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Executable to launch.
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Address the service listens on; must agree with `args`.
    pub host: String,
    pub port: u16,
    /// Endpoint path polled for readiness.
    pub health_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            working_dir: None,
            host: "127.0.0.1".into(),
            port: 8188,
            health_path: "/system_stats".into(),
        }
    }
}

impl ServiceConfig {
    /// Base URL of the running service.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Full health endpoint URL.
    #[must_use]
    pub fn health_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.health_path)
    }
}

/// Readiness probe timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Seconds between health polls.
    pub poll_interval_secs: u64,
    /// Poll budget after warm-up, in seconds.
    pub max_wait_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            max_wait_secs: 120,
        }
    }
}

impl ProbeConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Handler process that receives control once the service is ready.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Extra environment for the handler process.
    pub env: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;

        // Hub token comes from the environment, never from the file.
        config.hub.token = std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty());

        config.resolve_asset_paths();
        config.validate()?;

        Ok(config)
    }

    /// Initialize logging from this configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Directory relative asset paths resolve against.
    #[must_use]
    pub fn assets_root(&self) -> PathBuf {
        self.assets_root.clone().unwrap_or_else(default_assets_root)
    }

    /// Anchor relative asset paths at the assets root.
    fn resolve_asset_paths(&mut self) {
        let root = self.assets_root();
        for asset in &mut self.assets {
            if asset.local_path.is_relative() {
                asset.local_path = root.join(&asset.local_path);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.hub.base_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "hub.base_url",
            }
            .into());
        }
        if self.hub.retry_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hub.retry_rounds",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.service.command.is_empty() {
            return Err(ConfigError::MissingField {
                field: "service.command",
            }
            .into());
        }
        if self.service.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "service.port",
                reason: "must be nonzero".into(),
            }
            .into());
        }
        if !self.service.health_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "service.health_path",
                reason: "must start with '/'".into(),
            }
            .into());
        }
        if self.probe.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probe.poll_interval_secs",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.probe.max_wait_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probe.max_wait_secs",
                reason: "readiness waiting must be bounded".into(),
            }
            .into());
        }
        if self.handoff.command.is_empty() {
            return Err(ConfigError::MissingField {
                field: "handoff.command",
            }
            .into());
        }

        for asset in &self.assets {
            if asset.name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "asset.name",
                    reason: "must not be empty".into(),
                }
                .into());
            }
            if asset.repo.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "asset.repo",
                    reason: format!("empty for asset '{}'", asset.name),
                }
                .into());
            }
            match &asset.source {
                AssetSource::Single { remote } if remote.is_empty() => {
                    return Err(ConfigError::InvalidValue {
                        field: "asset.remote",
                        reason: format!("empty for asset '{}'", asset.name),
                    }
                    .into());
                }
                AssetSource::Partitioned { parts, manifest } => {
                    if parts.is_empty() {
                        return Err(ConfigError::InvalidValue {
                            field: "asset.parts",
                            reason: format!("no parts listed for asset '{}'", asset.name),
                        }
                        .into());
                    }
                    if manifest.is_empty() {
                        return Err(ConfigError::InvalidValue {
                            field: "asset.manifest",
                            reason: format!("empty for asset '{}'", asset.name),
                        }
                        .into());
                    }
                }
                AssetSource::Single { .. } => {}
            }
        }

        Ok(())
    }
}

fn default_assets_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coldstart")
        .join("models")
}

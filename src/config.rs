//! Application configuration.
//!
//! Settings come from a plaintext TOML file named on the command line and
//! are assembled into a runtime [`Ctx`]. The execution mode gates every
//! onchain submission: sandbox deployments run the full product surface
//! against the widget sandbox with no funded network behind it.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

use crate::network::Chain;
use crate::ramp::RampConfig;

#[derive(Parser, Debug)]
pub struct Env {
    /// Path to the TOML configuration file
    #[clap(long)]
    pub config: PathBuf,
}

impl Env {
    pub fn into_ctx(self) -> Result<Ctx, ConfigError> {
        let raw = std::fs::read_to_string(&self.config)?;
        let config: Config = toml::from_str(&raw)?;

        Ok(config.into())
    }
}

/// Whether vault operations are actually submitted onchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Live,
    Sandbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Settings deserialized from the TOML file.
#[derive(Debug, Deserialize)]
struct Config {
    network: Chain,
    mode: ExecutionMode,
    /// Endpoint issuing widget session tokens.
    session_endpoint: Url,
    log_level: Option<LogLevel>,
    ramp: Option<RampSettings>,
}

/// Optional ramp tuning overrides.
#[derive(Debug, Default, Deserialize)]
struct RampSettings {
    provider_domain: Option<String>,
    poll_interval_ms: Option<u64>,
    max_wait_secs: Option<u64>,
    fiat_currency: Option<String>,
}

/// Runtime context assembled from the configuration.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub chain: Chain,
    pub mode: ExecutionMode,
    pub session_endpoint: Url,
    pub log_level: LogLevel,
    pub ramp: RampConfig,
}

impl From<Config> for Ctx {
    fn from(config: Config) -> Self {
        let settings = config.ramp.unwrap_or_default();
        let mut ramp = RampConfig::default();
        if let Some(provider_domain) = settings.provider_domain {
            ramp.provider_domain = provider_domain;
        }
        if let Some(poll_interval_ms) = settings.poll_interval_ms {
            ramp.poll_interval = Duration::from_millis(poll_interval_ms);
        }
        if let Some(max_wait_secs) = settings.max_wait_secs {
            ramp.max_wait = Duration::from_secs(max_wait_secs);
        }
        if let Some(fiat_currency) = settings.fiat_currency {
            ramp.fiat_currency = fiat_currency;
        }

        Self {
            chain: config.network,
            mode: config.mode,
            session_endpoint: config.session_endpoint,
            log_level: config.log_level.unwrap_or(LogLevel::Info),
            ramp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

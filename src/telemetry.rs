//! Console tracing setup.
//!
//! Installs a fmt subscriber filtered to this crate at the configured
//! level. `RUST_LOG` overrides the default filter entirely, which keeps
//! external crate spam (reqwest, hyper) out of the console unless
//! explicitly requested.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::LogLevel;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Default filter directive: this crate only, at `level`.
fn default_directive(level: LogLevel) -> String {
    format!("prizesave={}", level.as_level())
}

/// Install the global console subscriber. Call once at process start.
pub fn init(level: LogLevel) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish()
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_scopes_to_this_crate() {
        assert_eq!(default_directive(LogLevel::Debug), "prizesave=DEBUG");
        assert_eq!(default_directive(LogLevel::Warn), "prizesave=WARN");
    }
}

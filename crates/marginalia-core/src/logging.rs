//! Tracing setup.
//!
//! Logs go to a daily-rotated file under `$MARGINALIA_HOME/logs` so they never
//! interleave with command output.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Config, paths};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "MARGINALIA_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Picks the filter directive: environment, then config, then the default.
fn directive(config: &Config, env: Option<String>) -> String {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| config.log_filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the program; dropping it
/// flushes and stops the background writer.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    let dir = paths::logs_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, "marginalia.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let directive = directive(config, std::env::var(LOG_ENV).ok());
    let filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to build log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(filter = %directive, "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_config() {
        let config = Config {
            log_filter: Some("info".to_string()),
            ..Default::default()
        };
        assert_eq!(directive(&config, Some("debug".to_string())), "debug");
        assert_eq!(directive(&config, Some("  ".to_string())), "info");
        assert_eq!(directive(&config, None), "info");
    }

    #[test]
    fn test_default_filter_is_warn() {
        assert_eq!(directive(&Config::default(), None), "warn");
    }
}

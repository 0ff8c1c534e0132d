//! Configuration management for Marginalia.
//!
//! Loads configuration from ${MARGINALIA_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Selection thread behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadsConfig {
    /// Remove a draft thread (no messages sent) when it is exited.
    pub cleanup_drafts_on_exit: bool,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            cleanup_drafts_on_exit: true,
        }
    }
}

/// Markers used when highlights are rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub open_marker: String,
    pub close_marker: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            open_marker: "[[".to_string(),
            close_marker: "]]".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persist the conversation after every mutation
    pub autosave: bool,

    /// Tracing filter directive (overridden by MARGINALIA_LOG)
    pub log_filter: Option<String>,

    #[serde(default)]
    pub threads: ThreadsConfig,

    #[serde(default)]
    pub highlight: HighlightConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autosave: true,
            log_filter: None,
            threads: ThreadsConfig::default(),
            highlight: HighlightConfig::default(),
        }
    }
}

/// Returns the default config template.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for Marginalia configuration and data directories.
    //!
    //! MARGINALIA_HOME resolution order:
    //! 1. MARGINALIA_HOME environment variable (if set)
    //! 2. ~/.config/marginalia (default)
    //! 3. ./.marginalia when no home directory can be determined

    use std::path::PathBuf;

    pub fn marginalia_home() -> PathBuf {
        if let Ok(home) = std::env::var("MARGINALIA_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".marginalia"),
            |h| h.join(".config").join("marginalia"),
        )
    }

    pub fn config_path() -> PathBuf {
        marginalia_home().join("config.toml")
    }

    pub fn conversations_dir() -> PathBuf {
        marginalia_home().join("conversations")
    }

    pub fn logs_dir() -> PathBuf {
        marginalia_home().join("logs")
    }
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules.

use super::{defaults, paths, schema::Config};
use crate::api::Endpoints;
use crate::terminal::TerminalMode;
use anyhow::{Context, Result};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Root config file
    /// 3. Built-in defaults
    pub fn load() -> Result<Config> {
        let path = paths::root_config_path();
        let config = if path.exists() {
            Self::load_file(&path)?
        } else {
            Self::load_defaults()
        };
        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a file
    ///
    /// Missing keys take their defaults.
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the merged configuration
    ///
    /// Fails on invalid YAML, invalid value types, an unusable API URL or a
    /// zero redraw interval.
    pub fn validate() -> Result<Config> {
        let config = Self::load().context("Failed to load merged configuration")?;
        Self::check(&config)?;
        Ok(config)
    }

    /// Semantic checks that serde cannot express
    pub fn check(config: &Config) -> Result<()> {
        Endpoints::new(&config.api_url, &config.live_path, &config.terminal_path)
            .context("apiUrl is not usable")?;
        if config.ui.tick_ms == 0 {
            return Err(anyhow::anyhow!("ui.tickMs must be greater than 0"));
        }
        if config.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("requestTimeoutSecs must be greater than 0"));
        }
        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
        // K8SLAB_API_URL override
        if let Some(url) = lookup("K8SLAB_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }

        // K8SLAB_TERMINAL_MODE override
        if let Some(mode) = lookup("K8SLAB_TERMINAL_MODE") {
            match mode.parse::<TerminalMode>() {
                Ok(mode) => config.terminal.mode = mode,
                Err(e) => tracing::warn!("Ignoring K8SLAB_TERMINAL_MODE: {}", e),
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

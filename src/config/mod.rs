//! Configuration system for k8slab
//!
//! Layered YAML configuration: built-in defaults, the root config file, then
//! environment overrides. The auth token is never part of it.

pub mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, ReconnectConfig, TerminalConfig, UiConfig};

/// Every key accepted by `config get` / `config set`
pub const CONFIG_KEYS: &[&str] = &[
    "apiUrl",
    "livePath",
    "terminalPath",
    "requestTimeoutSecs",
    "reconnect.baseDelayMs",
    "reconnect.maxAttempts",
    "terminal.mode",
    "ui.tickMs",
    "ui.showIds",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &schema::Config, key: &str) -> anyhow::Result<String> {
    match key {
        "apiUrl" => Ok(config.api_url.clone()),
        "livePath" => Ok(config.live_path.clone()),
        "terminalPath" => Ok(config.terminal_path.clone()),
        "requestTimeoutSecs" => Ok(config.request_timeout_secs.to_string()),
        "reconnect.baseDelayMs" => Ok(config.reconnect.base_delay_ms.to_string()),
        "reconnect.maxAttempts" => Ok(config.reconnect.max_attempts.to_string()),
        "terminal.mode" => Ok(config.terminal.mode.to_string()),
        "ui.tickMs" => Ok(config.ui.tick_ms.to_string()),
        "ui.showIds" => Ok(config.ui.show_ids.to_string()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut schema::Config, key: &str, value: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    match key {
        "apiUrl" => {
            config.api_url = value.to_string();
        }
        "livePath" => {
            config.live_path = value.to_string();
        }
        "terminalPath" => {
            config.terminal_path = value.to_string();
        }
        "requestTimeoutSecs" => {
            config.request_timeout_secs = value
                .parse()
                .context("requestTimeoutSecs must be a number")?;
        }
        "reconnect.baseDelayMs" => {
            config.reconnect.base_delay_ms = value
                .parse()
                .context("reconnect.baseDelayMs must be a number")?;
        }
        "reconnect.maxAttempts" => {
            config.reconnect.max_attempts = value
                .parse()
                .context("reconnect.maxAttempts must be a number")?;
        }
        "terminal.mode" => {
            config.terminal.mode = value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        }
        "ui.tickMs" => {
            config.ui.tick_ms = value.parse().context("ui.tickMs must be a number")?;
        }
        "ui.showIds" => {
            config.ui.show_ids = value
                .parse()
                .context("ui.showIds must be 'true' or 'false'")?;
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}

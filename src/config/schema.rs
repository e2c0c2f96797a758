//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use crate::terminal::TerminalMode;
use crate::transport::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the HTTP API; channel URLs derive from it
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Path of the shared live channel, relative to the API base
    #[serde(default = "default_live_path")]
    pub live_path: String,

    /// Path prefix of dedicated terminal channels
    #[serde(default = "default_terminal_path")]
    pub terminal_path: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reconnect behaviour of the live channel
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Terminal session configuration
    #[serde(default)]
    pub terminal: TerminalConfig,

    /// UI configuration
    #[serde(default)]
    pub ui: UiConfig,
}

/// Reconnect configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Delay unit in milliseconds; reconnect n waits `n * baseDelayMs`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Reconnects after which the channel reports itself disconnected
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Terminal configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TerminalConfig {
    #[serde(default)]
    pub mode: TerminalMode,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    /// Redraw interval in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Show resource ids next to names
    #[serde(default = "default_false")]
    pub show_ids: bool,
}

// Default value functions
fn default_api_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_live_path() -> String {
    "/ws".to_string()
}

fn default_terminal_path() -> String {
    "/ws/terminal".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_tick_ms() -> u64 {
    100
}

fn default_false() -> bool {
    false
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            live_path: default_live_path(),
            terminal_path: default_terminal_path(),
            request_timeout_secs: default_request_timeout_secs(),
            reconnect: ReconnectConfig::default(),
            terminal: TerminalConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            show_ids: default_false(),
        }
    }
}

//! Default configuration values
//!
//! Provides default configuration instances and helper functions.

use super::schema::Config;

/// Get the default configuration
pub fn default_config() -> Config {
    Config::default()
}

/// Commented starter file written by `config init`
pub fn starter_yaml() -> String {
    format!(
        "# k8slab configuration\n\
         # Environment overrides: K8SLAB_API_URL, K8SLAB_TERMINAL_MODE\n\
         {}",
        serde_yaml::to_string(&default_config()).unwrap_or_default()
    )
}

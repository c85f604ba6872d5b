//! `RESILINK_*` overrides applied on top of the config file.
//!
//! - `RESILINK_TARGET_HOST` - Target host
//! - `RESILINK_TARGET_PORT` - Target port
//! - `RESILINK_PRESET` - Reconnect preset name
//! - `RESILINK_MAX_RETRIES` - Retries after the first failure

use std::env;

use crate::config::types::{Config, ReconnectSection};

const ENV_PREFIX: &str = "RESILINK";

/// Values that fail to parse are ignored and the file value is kept.
/// Preset and retry overrides create the `reconnect` section if needed.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(host) = env::var(format!("{}_TARGET_HOST", ENV_PREFIX)) {
        config.target.host = host;
    }
    if let Ok(port) = env::var(format!("{}_TARGET_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.target.port = port;
        }
    }

    if let Ok(preset) = env::var(format!("{}_PRESET", ENV_PREFIX)) {
        config
            .reconnect
            .get_or_insert_with(ReconnectSection::default)
            .preset = Some(preset);
    }
    if let Ok(retries) = env::var(format!("{}_MAX_RETRIES", ENV_PREFIX)) {
        if let Ok(retries) = retries.parse() {
            config
                .reconnect
                .get_or_insert_with(ReconnectSection::default)
                .max_retries = Some(retries);
        }
    }

    config
}

/// `RESILINK_CONFIG`, falling back to `resilink.conf` in the working directory.
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "resilink.conf".to_string())
}

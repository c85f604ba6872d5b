//! Configuration type definitions.

use std::time::Duration;

use serde::Deserialize;

use resilink::{
    BackoffStrategy, ConfigError, ConfigResult, ReconnectConfig, ReconnectConfigUpdate,
    ReconnectPreset,
};

/// Connect timeout used when `target.connect_timeout_ms` is not set.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub reconnect: Option<ReconnectSection>,
}

/// Endpoint the binary keeps connected.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    /// Per-attempt connect timeout in milliseconds.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

/// Retry policy as written in the config file.
///
/// `preset` picks the starting point; every other field overrides it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconnectSection {
    #[serde(default)]
    pub preset: Option<String>,
    /// "immediate", "linear" or "exponential"
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub initial_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub backoff_factor: Option<f64>,
    #[serde(default)]
    pub enable_auto_reconnect: Option<bool>,
    #[serde(default)]
    pub retry_on_errors: Option<Vec<String>>,
}

impl ReconnectSection {
    /// Overrides only, without the preset.
    pub fn overrides(&self) -> ConfigResult<ReconnectConfigUpdate> {
        let mut update = ReconnectConfigUpdate::new();

        if let Some(ref name) = self.strategy {
            let strategy: BackoffStrategy = name.parse()?;
            if strategy == BackoffStrategy::Custom {
                return Err(ConfigError::ValidationError {
                    message: "reconnect.strategy 'custom' needs a delay function and cannot be set from a config file".to_string(),
                });
            }
            update = update.strategy(strategy);
        }
        if let Some(max_retries) = self.max_retries {
            update = update.max_retries(max_retries);
        }
        if let Some(ms) = self.initial_delay_ms {
            update = update.initial_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.max_delay_ms {
            update = update.max_delay(Duration::from_millis(ms));
        }
        if let Some(factor) = self.backoff_factor {
            update = update.backoff_factor(factor);
        }
        if let Some(enabled) = self.enable_auto_reconnect {
            update = update.enable_auto_reconnect(enabled);
        }
        if let Some(ref tokens) = self.retry_on_errors {
            update = update.retry_on_errors(tokens.iter().cloned());
        }

        Ok(update)
    }

    /// Preset (or defaults) with the overrides applied on top.
    pub fn resolve(&self) -> ConfigResult<ReconnectConfig> {
        let mut config = match self.preset {
            Some(ref name) => name.parse::<ReconnectPreset>()?.config(),
            None => ReconnectConfig::default(),
        };
        self.overrides()?.apply_to(&mut config);
        Ok(config)
    }
}

impl Config {
    /// Resolved retry policy; defaults when the section is absent.
    pub fn reconnect_config(&self) -> ConfigResult<ReconnectConfig> {
        match self.reconnect {
            Some(ref section) => section.resolve(),
            None => Ok(ReconnectConfig::default()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.target
                .connect_timeout_ms
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        )
    }

    /// `host:port` for display.
    pub fn target_addr(&self) -> String {
        format!("{}:{}", self.target.host, self.target.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_config(reconnect: Option<ReconnectSection>) -> Config {
        Config {
            target: TargetConfig {
                host: "media.local".to_string(),
                port: 8554,
                connect_timeout_ms: None,
            },
            reconnect,
        }
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = make_test_config(None);
        let reconnect = config.reconnect_config().unwrap();
        assert_eq!(reconnect.max_retries, 5);
        assert_eq!(reconnect.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.target_addr(), "media.local:8554");
    }

    #[test]
    fn test_preset_then_overrides() {
        let section = ReconnectSection {
            preset: Some("persistent".to_string()),
            max_retries: Some(4),
            retry_on_errors: Some(vec!["TimeoutError".to_string()]),
            ..ReconnectSection::default()
        };
        let reconnect = make_test_config(Some(section)).reconnect_config().unwrap();

        assert_eq!(reconnect.max_retries, 4);
        assert_eq!(reconnect.initial_delay, Duration::from_secs(2));
        assert_eq!(reconnect.backoff_factor, 1.8);
        assert_eq!(reconnect.retry_on_errors, vec!["TimeoutError"]);
    }

    #[test]
    fn test_custom_strategy_rejected() {
        let section = ReconnectSection {
            strategy: Some("custom".to_string()),
            ..ReconnectSection::default()
        };
        let err = section.resolve().unwrap_err();
        assert!(err.to_string().contains("custom"));
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let section = ReconnectSection {
            preset: Some("warp".to_string()),
            ..ReconnectSection::default()
        };
        assert!(matches!(
            section.resolve(),
            Err(ConfigError::UnknownPreset { .. })
        ));
    }
}

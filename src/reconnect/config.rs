//! Reconnection configuration, partial updates and presets.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::common::error::{
    ConfigError, ConfigResult, CONNECTION_ERROR, MEDIA_ERROR, NETWORK_ERROR, TIMEOUT_ERROR,
};

/// Caller-supplied delay function for [`BackoffStrategy::Custom`].
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Shape of the delay growth between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    Immediate,
    Linear,
    #[default]
    Exponential,
    Custom,
}

impl BackoffStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Linear => "linear",
            Self::Exponential => "exponential",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackoffStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            "custom" => Ok(Self::Custom),
            _ => Err(ConfigError::UnknownStrategy {
                name: s.to_string(),
            }),
        }
    }
}

/// Retry policy for one logical connection.
#[derive(Clone)]
pub struct ReconnectConfig {
    pub strategy: BackoffStrategy,
    /// Retries allowed after the first failure.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Ceiling applied after jitter.
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Master switch; when off no retry is ever scheduled.
    pub enable_auto_reconnect: bool,
    /// Error class tokens (or message fragments) worth retrying.
    pub retry_on_errors: Vec<String>,
    /// Only consulted when `strategy` is `Custom`.
    pub custom_delay: Option<DelayFn>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            max_retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
            enable_auto_reconnect: true,
            retry_on_errors: vec![
                NETWORK_ERROR.to_string(),
                TIMEOUT_ERROR.to_string(),
                CONNECTION_ERROR.to_string(),
                MEDIA_ERROR.to_string(),
            ],
            custom_delay: None,
        }
    }
}

impl fmt::Debug for ReconnectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectConfig")
            .field("strategy", &self.strategy)
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("enable_auto_reconnect", &self.enable_auto_reconnect)
            .field("retry_on_errors", &self.retry_on_errors)
            .field("custom_delay", &self.custom_delay.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ReconnectConfig {
    /// Use a custom delay function; also switches the strategy to `Custom`.
    pub fn with_custom_delay<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.strategy = BackoffStrategy::Custom;
        self.custom_delay = Some(Arc::new(f));
        self
    }

    /// Check the numeric invariants, collecting every problem.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.max_delay < self.initial_delay {
            errors.push(format!(
                "max_delay ({} ms) must be >= initial_delay ({} ms)",
                self.max_delay.as_millis(),
                self.initial_delay.as_millis()
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            errors.push(format!(
                "backoff_factor must be a finite number >= 1 (got {})",
                self.backoff_factor
            ));
        }
        if self.enable_auto_reconnect && self.retry_on_errors.is_empty() {
            errors.push(
                "retry_on_errors is empty - auto-reconnect would never retry".to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError {
                message: errors.join("\n"),
            })
        }
    }
}

/// Partial configuration; `None` fields leave the current value untouched.
#[derive(Clone, Default)]
pub struct ReconnectConfigUpdate {
    pub strategy: Option<BackoffStrategy>,
    pub max_retries: Option<u32>,
    pub initial_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub backoff_factor: Option<f64>,
    pub enable_auto_reconnect: Option<bool>,
    pub retry_on_errors: Option<Vec<String>>,
    pub custom_delay: Option<DelayFn>,
}

impl ReconnectConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    pub fn enable_auto_reconnect(mut self, enabled: bool) -> Self {
        self.enable_auto_reconnect = Some(enabled);
        self
    }

    pub fn retry_on_errors<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retry_on_errors = Some(tokens.into_iter().map(Into::into).collect());
        self
    }

    pub fn custom_delay<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.custom_delay = Some(Arc::new(f));
        self
    }

    /// Merge into `config`, field by field.
    pub fn apply_to(self, config: &mut ReconnectConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(delay) = self.initial_delay {
            config.initial_delay = delay;
        }
        if let Some(delay) = self.max_delay {
            config.max_delay = delay;
        }
        if let Some(factor) = self.backoff_factor {
            config.backoff_factor = factor;
        }
        if let Some(enabled) = self.enable_auto_reconnect {
            config.enable_auto_reconnect = enabled;
        }
        if let Some(tokens) = self.retry_on_errors {
            config.retry_on_errors = tokens;
        }
        if let Some(f) = self.custom_delay {
            config.custom_delay = Some(f);
        }
    }
}

/// Named starting points for common network conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPreset {
    /// Stable networks: few quick retries.
    Fast,
    /// Balanced default.
    Standard,
    /// Flaky networks: many slow retries.
    Persistent,
    /// Fixed-step growth.
    Linear,
}

impl ReconnectPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Standard => "standard",
            Self::Persistent => "persistent",
            Self::Linear => "linear",
        }
    }

    /// The preset as a partial update over the defaults.
    pub fn update(&self) -> ReconnectConfigUpdate {
        let (strategy, max_retries, initial_ms, max_ms, factor) = match self {
            Self::Fast => (BackoffStrategy::Exponential, 3, 500, 5_000, 1.5),
            Self::Standard => (BackoffStrategy::Exponential, 5, 1_000, 15_000, 2.0),
            Self::Persistent => (BackoffStrategy::Exponential, 10, 2_000, 60_000, 1.8),
            Self::Linear => (BackoffStrategy::Linear, 5, 3_000, 15_000, 1.0),
        };

        ReconnectConfigUpdate::new()
            .strategy(strategy)
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(initial_ms))
            .max_delay(Duration::from_millis(max_ms))
            .backoff_factor(factor)
    }

    pub fn config(&self) -> ReconnectConfig {
        let mut config = ReconnectConfig::default();
        self.update().apply_to(&mut config);
        config
    }
}

impl FromStr for ReconnectPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "standard" => Ok(Self::Standard),
            "persistent" => Ok(Self::Persistent),
            "linear" => Ok(Self::Linear),
            _ => Err(ConfigError::UnknownPreset {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ReconnectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.backoff_factor, 2.0);
        assert!(config.enable_auto_reconnect);
        assert_eq!(
            config.retry_on_errors,
            vec!["NetworkError", "TimeoutError", "ConnectionError", "MediaError"]
        );
        assert!(config.custom_delay.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_update_only_touches_set_fields() {
        let mut config = ReconnectConfig::default();
        ReconnectConfigUpdate::new()
            .max_retries(9)
            .enable_auto_reconnect(false)
            .apply_to(&mut config);

        assert_eq!(config.max_retries, 9);
        assert!(!config.enable_auto_reconnect);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.strategy, BackoffStrategy::Exponential);
    }

    #[test]
    fn test_presets() {
        let fast = ReconnectPreset::Fast.config();
        assert_eq!(fast.max_retries, 3);
        assert_eq!(fast.initial_delay, Duration::from_millis(500));
        assert_eq!(fast.max_delay, Duration::from_millis(5000));
        assert_eq!(fast.backoff_factor, 1.5);

        let persistent = ReconnectPreset::Persistent.config();
        assert_eq!(persistent.max_retries, 10);
        assert_eq!(persistent.max_delay, Duration::from_secs(60));

        let linear = ReconnectPreset::Linear.config();
        assert_eq!(linear.strategy, BackoffStrategy::Linear);
        assert_eq!(linear.initial_delay, Duration::from_secs(3));

        // Presets keep the default allow-list
        assert_eq!(linear.retry_on_errors.len(), 4);
        for preset in [
            ReconnectPreset::Fast,
            ReconnectPreset::Standard,
            ReconnectPreset::Persistent,
            ReconnectPreset::Linear,
        ] {
            assert!(preset.config().validate().is_ok(), "{} invalid", preset);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Persistent".parse::<ReconnectPreset>().unwrap(), ReconnectPreset::Persistent);
        assert!(matches!(
            "turbo".parse::<ReconnectPreset>(),
            Err(ConfigError::UnknownPreset { .. })
        ));
        assert_eq!(" LINEAR ".parse::<BackoffStrategy>().unwrap(), BackoffStrategy::Linear);
        assert!(matches!(
            "fibonacci".parse::<BackoffStrategy>(),
            Err(ConfigError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn test_validate_collects_errors() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            backoff_factor: 0.5,
            retry_on_errors: Vec::new(),
            ..ReconnectConfig::default()
        };

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("max_delay"));
        assert!(message.contains("backoff_factor"));
        assert!(message.contains("retry_on_errors"));
    }

    #[test]
    fn test_with_custom_delay_switches_strategy() {
        let config = ReconnectConfig::default().with_custom_delay(|n| Duration::from_millis(n as u64));
        assert_eq!(config.strategy, BackoffStrategy::Custom);
        let f = config.custom_delay.as_ref().unwrap();
        assert_eq!(f(7), Duration::from_millis(7));
    }
}

//! Checks on a loaded config before the controller is built.

use resilink::{ConfigError, ConfigResult};

use crate::config::types::Config;

/// Every problem is reported, one per line, in a single `ValidationError`.
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    let mut errors = Vec::new();

    // Validate target
    if config.target.host.trim().is_empty() {
        errors.push("target.host is required".to_string());
    }
    if config.target.port == 0 {
        errors.push("target.port must be non-zero".to_string());
    }
    if config.target.connect_timeout_ms == Some(0) {
        errors.push("target.connect_timeout_ms must be non-zero".to_string());
    }

    // Validate retry policy
    match config.reconnect_config() {
        Ok(reconnect) => {
            if let Err(ConfigError::ValidationError { message }) = reconnect.validate() {
                errors.extend(message.lines().map(|line| format!("reconnect: {}", line)));
            }
        }
        Err(ConfigError::ValidationError { message }) => errors.push(message),
        Err(e) => errors.push(e.to_string()),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            target: TargetConfig {
                host: "camera-7.local".to_string(),
                port: 554,
                connect_timeout_ms: Some(3000),
            },
            reconnect: Some(ReconnectSection {
                preset: Some("standard".to_string()),
                ..ReconnectSection::default()
            }),
        }
    }

    #[test]
    fn test_standard_preset_is_valid() {
        assert!(validate_config(&make_valid_config()).is_ok());
    }

    #[test]
    fn test_empty_host_fails() {
        let mut config = make_valid_config();
        config.target.host = "  ".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("target.host"));
    }

    #[test]
    fn test_zero_port_fails() {
        let mut config = make_valid_config();
        config.target.port = 0;

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("target.port"));
    }

    #[test]
    fn test_max_delay_below_initial_fails() {
        let mut config = make_valid_config();
        config.reconnect = Some(ReconnectSection {
            initial_delay_ms: Some(10_000),
            max_delay_ms: Some(1_000),
            ..ReconnectSection::default()
        });

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("reconnect: max_delay"));
    }

    #[test]
    fn test_factor_below_one_fails() {
        let mut config = make_valid_config();
        config.reconnect = Some(ReconnectSection {
            backoff_factor: Some(0.5),
            ..ReconnectSection::default()
        });

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("backoff_factor"));
    }

    #[test]
    fn test_unknown_strategy_fails() {
        let mut config = make_valid_config();
        config.reconnect = Some(ReconnectSection {
            strategy: Some("fibonacci".to_string()),
            ..ReconnectSection::default()
        });

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("fibonacci"));
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = make_valid_config();
        config.target.host = String::new();
        config.target.port = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("target.host"));
        assert!(message.contains("target.port"));
    }
}

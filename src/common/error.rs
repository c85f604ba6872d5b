//! Error types for the application.

use std::io;

use thiserror::Error;

/// Class token for generic network failures.
pub const NETWORK_ERROR: &str = "NetworkError";
/// Class token for operations that ran out of time.
pub const TIMEOUT_ERROR: &str = "TimeoutError";
/// Class token for refused, reset or dropped connections.
pub const CONNECTION_ERROR: &str = "ConnectionError";
/// Class token for media/session negotiation failures.
pub const MEDIA_ERROR: &str = "MediaError";
/// Class token for a connect operation that panicked.
pub const PANIC_ERROR: &str = "Panic";

/// A failed connect attempt.
///
/// Carries a coarse classification token (e.g. `"NetworkError"`) next to the
/// human readable message. The retry predicate matches against both, so the
/// token does not need to be an exact type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct ConnectError {
    class: String,
    message: String,
}

impl ConnectError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(NETWORK_ERROR, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TIMEOUT_ERROR, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(CONNECTION_ERROR, message)
    }

    pub fn media(message: impl Into<String>) -> Self {
        Self::new(MEDIA_ERROR, message)
    }

    /// Build from a panic payload caught around a connect operation.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        Self::new(PANIC_ERROR, panic_message(payload.as_ref()))
    }

    /// Classification token.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for ConnectError {
    fn from(err: io::Error) -> Self {
        let class = match err.kind() {
            io::ErrorKind::TimedOut => TIMEOUT_ERROR,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => CONNECTION_ERROR,
            _ => NETWORK_ERROR,
        };
        Self::new(class, err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ConnectError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::timeout(err.to_string())
    }
}

impl From<anyhow::Error> for ConnectError {
    fn from(err: anyhow::Error) -> Self {
        // Typed sources keep their classification
        if let Some(connect) = err.downcast_ref::<ConnectError>() {
            return connect.clone();
        }
        if let Some(io) = err.downcast_ref::<io::Error>() {
            let mut mapped = Self::from(io::Error::new(io.kind(), io.to_string()));
            mapped.message = format!("{:#}", err);
            return mapped;
        }
        Self::new("Error", format!("{:#}", err))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "connect operation panicked".to_string()
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Unknown reconnect preset '{name}' (use: fast, standard, persistent, linear)")]
    UnknownPreset { name: String },

    #[error("Unknown backoff strategy '{name}' (use: immediate, linear, exponential, custom)")]
    UnknownStrategy { name: String },
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(ConnectError::from(refused).class(), CONNECTION_ERROR);

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(ConnectError::from(timed_out).class(), TIMEOUT_ERROR);

        let other = io::Error::new(io::ErrorKind::AddrNotAvailable, "no route");
        assert_eq!(ConnectError::from(other).class(), NETWORK_ERROR);
    }

    #[test]
    fn test_anyhow_keeps_typed_class() {
        let err = anyhow::Error::new(ConnectError::media("ice failed"));
        let converted = ConnectError::from(err);
        assert_eq!(converted.class(), MEDIA_ERROR);
        assert_eq!(converted.message(), "ice failed");

        let io_err = anyhow::Error::new(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .context("dialing relay");
        let converted = ConnectError::from(io_err);
        assert_eq!(converted.class(), CONNECTION_ERROR);
        assert!(converted.message().contains("dialing relay"));
    }

    #[test]
    fn test_plain_anyhow_is_unclassified() {
        let converted = ConnectError::from(anyhow::anyhow!("boom"));
        assert_eq!(converted.class(), "Error");
        assert_eq!(converted.to_string(), "Error: boom");
    }

    #[test]
    fn test_panic_payloads() {
        let err = ConnectError::from_panic(Box::new("static str"));
        assert_eq!(err.class(), PANIC_ERROR);
        assert_eq!(err.message(), "static str");

        let err = ConnectError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.message(), "owned");

        let err = ConnectError::from_panic(Box::new(42u8));
        assert_eq!(err.message(), "connect operation panicked");
    }
}

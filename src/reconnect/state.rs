//! Connection state and statistics snapshot.

use std::fmt;

use serde::Serialize;

use crate::common::error::ConnectError;

/// Lifecycle state of one logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// A state with a connect cycle still running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconnectStats {
    pub current_attempt: u32,
    pub max_retries: u32,
    pub state: ConnectionState,
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<ConnectError>,
    /// A retry is waiting on its timer or in flight.
    pub is_reconnecting: bool,
}

fn serialize_error<S>(error: &Option<ConnectError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize() {
        let stats = ReconnectStats {
            current_attempt: 2,
            max_retries: 5,
            state: ConnectionState::Reconnecting,
            last_error: Some(ConnectError::timeout("no answer")),
            is_reconnecting: true,
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["state"], "reconnecting");
        assert_eq!(json["last_error"], "TimeoutError: no answer");
        assert_eq!(json["current_attempt"], 2);
    }

    #[test]
    fn test_active_states() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Reconnecting.is_active());
        assert!(!ConnectionState::Failed.is_active());
        assert!(!ConnectionState::Connected.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
    }
}

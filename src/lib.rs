//! Resilink - connection resilience controller.
//!
//! Wraps any possibly-failing async connect operation with automatic retry,
//! configurable backoff, jitter and cancellation, and reports lifecycle
//! transitions through a synchronous event bus.

pub mod common;
pub mod reconnect;

pub use common::error::{ConfigError, ConfigResult, ConnectError};
pub use reconnect::{
    BackoffStrategy, ConnectOutcome, ConnectionState, EventKind, ListenerId, ReconnectConfig,
    ReconnectConfigUpdate, ReconnectEvent, ReconnectPreset, ReconnectStats, ResilienceController,
};

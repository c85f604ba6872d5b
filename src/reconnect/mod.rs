//! Connection resilience: retry, backoff, jitter and cancellation.
//!
//! ## Module Structure
//!
//! - `backoff`: delay calculation and the `backon` adapter
//! - `policy`: retry predicate
//! - `events`: lifecycle event bus
//! - `config`: `ReconnectConfig`, partial updates and presets
//! - `state`: `ConnectionState` and stats snapshot
//! - `controller`: the `ResilienceController` state machine

pub mod backoff;
pub mod config;
pub mod controller;
pub mod events;
pub mod policy;
pub mod state;

pub use backoff::{delay_with_sample, next_delay, ReconnectBackoff};
pub use config::{BackoffStrategy, DelayFn, ReconnectConfig, ReconnectConfigUpdate, ReconnectPreset};
pub use controller::{ConnectOutcome, ResilienceController};
pub use events::{EventBus, EventKind, ListenerId, ReconnectEvent};
pub use policy::should_retry;
pub use state::{ConnectionState, ReconnectStats};

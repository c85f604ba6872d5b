//! Synchronous publish/subscribe for controller lifecycle events.
//!
//! Listeners run on the emitting caller's context, in subscription order.
//! A listener that panics is caught and logged; the remaining listeners for
//! that event still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::error;

use crate::common::error::ConnectError;
use crate::reconnect::state::ConnectionState;

/// Event names listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Attempt,
    Success,
    Failure,
    Abort,
    StateChange,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        Self::Attempt,
        Self::Success,
        Self::Failure,
        Self::Abort,
        Self::StateChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attempt => "attempt",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Abort => "abort",
            Self::StateChange => "stateChange",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event published by a controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectEvent {
    /// A retry was scheduled to run after `delay`.
    Attempt {
        attempt: u32,
        delay: Duration,
        timestamp: DateTime<Utc>,
    },
    /// The connect operation succeeded on `attempt` (0 for the first try).
    Success {
        attempt: u32,
        delay: Duration,
        timestamp: DateTime<Utc>,
    },
    /// The cycle ended in `Failed`.
    Failure {
        attempt: u32,
        delay: Duration,
        error: ConnectError,
        timestamp: DateTime<Utc>,
    },
    /// The cycle was cancelled by `stop_reconnect`.
    Abort {
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    StateChange { new_state: ConnectionState },
}

impl ReconnectEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Attempt { .. } => EventKind::Attempt,
            Self::Success { .. } => EventKind::Success,
            Self::Failure { .. } => EventKind::Failure,
            Self::Abort { .. } => EventKind::Abort,
            Self::StateChange { .. } => EventKind::StateChange,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event callback.
pub type Listener = Arc<dyn Fn(&ReconnectEvent) + Send + Sync>;

/// Listener registry keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<(ListenerId, Listener)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe `callback` to `kind`.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&ReconnectEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove one listener, or every listener of `kind` when `id` is `None`.
    ///
    /// Returns whether anything was removed.
    pub fn off(&self, kind: EventKind, id: Option<ListenerId>) -> bool {
        let mut registry = self.registry();
        match id {
            Some(id) => {
                let Some(listeners) = registry.get_mut(&kind) else {
                    return false;
                };
                let before = listeners.len();
                listeners.retain(|(listener_id, _)| *listener_id != id);
                let removed = listeners.len() != before;
                if listeners.is_empty() {
                    registry.remove(&kind);
                }
                removed
            }
            None => registry.remove(&kind).is_some(),
        }
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.registry().clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to its listeners.
    ///
    /// The registry lock is released before any listener runs, so listeners
    /// may subscribe, unsubscribe or call back into the controller.
    pub fn emit(&self, event: &ReconnectEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = match self.registry().get(&kind) {
            Some(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };

        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Reconnect '{}' listener panicked: {}", kind, reason);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        let counts: HashMap<&str, usize> = registry
            .iter()
            .map(|(kind, listeners)| (kind.as_str(), listeners.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

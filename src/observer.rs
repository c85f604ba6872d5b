//! Event counters for a running controller.
//!
//! Subscribes to every event kind, logs each one and keeps running totals
//! that the binary prints when it exits.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::debug;

use resilink::{EventKind, ListenerId, ReconnectEvent, ResilienceController};

/// Totals collected from the event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObserverSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub aborts: u64,
    pub state_changes: u64,
    pub last_failure: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReconnectObserver {
    counters: Arc<Mutex<ObserverSnapshot>>,
}

impl ReconnectObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all event kinds on `controller`.
    pub fn attach(&self, controller: &ResilienceController) -> Vec<(EventKind, ListenerId)> {
        EventKind::ALL
            .into_iter()
            .map(|kind| {
                let counters = self.counters.clone();
                let id = controller.on(kind, move |event| record(&counters, event));
                (kind, id)
            })
            .collect()
    }

    pub fn snapshot(&self) -> ObserverSnapshot {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn record(counters: &Mutex<ObserverSnapshot>, event: &ReconnectEvent) {
    let mut counters = counters.lock().unwrap_or_else(PoisonError::into_inner);

    match event {
        ReconnectEvent::Attempt { attempt, delay, .. } => {
            counters.attempts += 1;
            debug!(
                "Attempt event #{} ({:.1}s)",
                attempt,
                delay.as_secs_f64()
            );
        }
        ReconnectEvent::Success { attempt, .. } => {
            counters.successes += 1;
            if *attempt > 0 {
                debug!("Success event after {} retries", attempt);
            } else {
                debug!("Success event on first try");
            }
        }
        ReconnectEvent::Failure { attempt, error, .. } => {
            counters.failures += 1;
            counters.last_failure = Some(error.to_string());
            debug!("Failure event after {} retries: {}", attempt, error);
        }
        ReconnectEvent::Abort { attempt, .. } => {
            counters.aborts += 1;
            debug!("Abort event at attempt {}", attempt);
        }
        ReconnectEvent::StateChange { new_state } => {
            counters.state_changes += 1;
            debug!("State change event: {}", new_state);
        }
    }
}

//! Connection resilience controller.
//!
//! Wraps an arbitrary async connect operation with retry, backoff, jitter
//! and cancellation. One controller manages one logical connection.
//!
//! # State transitions
//! ```text
//! Disconnected --connect()--> Connecting
//! Connecting   --ok--> Connected
//! Connecting   --err, retry--> Reconnecting   (attempt event, timer armed)
//! Connecting   --err, no retry--> Failed      (failure event)
//! Reconnecting --timer, ok--> Connected       (counter reset)
//! Reconnecting --timer, err, retry--> Reconnecting
//! Reconnecting --timer, err, no retry--> Failed
//! any          --stop_reconnect()--> Disconnected (abort event)
//! any          --reset()--> Disconnected      (no abort event)
//! ```
//!
//! The whole cycle is driven by the future returned from `connect()`; the
//! controller never spawns tasks. Retries run in a loop, one attempt at a
//! time, with the retry timer as the only other suspension point.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::common::error::ConnectError;
use crate::reconnect::backoff::next_delay;
use crate::reconnect::config::{ReconnectConfig, ReconnectConfigUpdate, ReconnectPreset};
use crate::reconnect::events::{EventBus, EventKind, ListenerId, ReconnectEvent};
use crate::reconnect::policy::should_retry;
use crate::reconnect::state::{ConnectionState, ReconnectStats};

/// How a `connect()` / `retry()` cycle ended.
///
/// The failure itself is reported through the `Failure` event and
/// [`ResilienceController::stats`], not through this value.
#[derive(Debug)]
pub enum ConnectOutcome<T> {
    /// The operation succeeded and produced `T`.
    Connected(T),
    /// Retries were exhausted or the error was not retryable.
    Failed,
    /// The cycle was cancelled, superseded, or the controller destroyed.
    Aborted,
}

impl<T> ConnectOutcome<T> {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn into_connected(self) -> Option<T> {
        match self {
            Self::Connected(value) => Some(value),
            _ => None,
        }
    }
}

/// The single armed retry timer.
#[derive(Debug)]
struct PendingRetry {
    id: u64,
    attempt: u32,
    delay: Duration,
    cancel: CancellationToken,
}

/// Result of resolving one attempt.
enum Step<T> {
    Done(ConnectOutcome<T>),
    Wait {
        id: u64,
        delay: Duration,
        cancel: CancellationToken,
    },
}

#[derive(Debug)]
struct ControllerState {
    config: ReconnectConfig,
    state: ConnectionState,
    attempt: u32,
    last_error: Option<ConnectError>,
    pending: Option<PendingRetry>,
    reconnecting: bool,
    /// Bumped whenever a running cycle is superseded or cancelled.
    cycle: u64,
    timer_seq: u64,
    destroyed: bool,
}

impl ControllerState {
    fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            attempt: 0,
            last_error: None,
            pending: None,
            reconnecting: false,
            cycle: 0,
            timer_seq: 0,
            destroyed: false,
        }
    }

    fn set_state(&mut self, new_state: ConnectionState, events: &mut Vec<ReconnectEvent>) {
        if self.state != new_state {
            debug!("Connection state: {} -> {}", self.state, new_state);
            self.state = new_state;
            events.push(ReconnectEvent::StateChange { new_state });
        }
    }

    /// Release the armed timer, if any.
    fn cancel_timer(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.cancel.cancel();
                debug!(
                    "Cancelled retry #{} (delay {:.1}s)",
                    pending.attempt,
                    pending.delay.as_secs_f64()
                );
                true
            }
            None => false,
        }
    }

    fn arm_timer(&mut self, attempt: u32, delay: Duration) -> (u64, CancellationToken) {
        self.timer_seq += 1;
        let cancel = CancellationToken::new();
        self.pending = Some(PendingRetry {
            id: self.timer_seq,
            attempt,
            delay,
            cancel: cancel.clone(),
        });
        (self.timer_seq, cancel)
    }

    /// Consume the timer when it expires. False if it was cancelled meanwhile.
    fn fire_timer(&mut self, id: u64, cycle: u64) -> bool {
        let ours = self.cycle == cycle && self.pending.as_ref().is_some_and(|p| p.id == id);
        if ours {
            self.pending = None;
        }
        ours
    }

    fn resolve_attempt<T>(
        &mut self,
        cycle: u64,
        last_delay: Duration,
        result: Result<T, ConnectError>,
        events: &mut Vec<ReconnectEvent>,
    ) -> Step<T> {
        if self.destroyed || self.cycle != cycle {
            debug!("Discarding result of a cancelled connect attempt");
            return Step::Done(ConnectOutcome::Aborted);
        }
        self.reconnecting = false;

        match result {
            Ok(value) => {
                let attempt = self.attempt;
                self.attempt = 0;
                self.set_state(ConnectionState::Connected, events);
                events.push(ReconnectEvent::Success {
                    attempt,
                    delay: last_delay,
                    timestamp: Utc::now(),
                });
                if attempt == 0 {
                    info!("Connected");
                } else {
                    info!("Reconnected on retry #{}", attempt);
                }
                Step::Done(ConnectOutcome::Connected(value))
            }
            Err(error) => {
                let retry = should_retry(&error, self.attempt, &self.config);
                self.last_error = Some(error.clone());

                if retry {
                    self.attempt += 1;
                    let attempt = self.attempt;
                    let delay = next_delay(&self.config, attempt);
                    let (id, cancel) = self.arm_timer(attempt, delay);
                    self.reconnecting = true;
                    self.set_state(ConnectionState::Reconnecting, events);
                    events.push(ReconnectEvent::Attempt {
                        attempt,
                        delay,
                        timestamp: Utc::now(),
                    });
                    warn!(
                        "Connect failed ({}). Retry {}/{} in {:.1}s...",
                        error,
                        attempt,
                        self.config.max_retries,
                        delay.as_secs_f64()
                    );
                    Step::Wait { id, delay, cancel }
                } else {
                    self.set_state(ConnectionState::Failed, events);
                    warn!(
                        "Connect failed after {} retries, giving up: {}",
                        self.attempt, error
                    );
                    events.push(ReconnectEvent::Failure {
                        attempt: self.attempt,
                        delay: last_delay,
                        error,
                        timestamp: Utc::now(),
                    });
                    Step::Done(ConnectOutcome::Failed)
                }
            }
        }
    }
}

/// Retry state machine for one logical connection.
///
/// All methods take `&self`; share the controller through an `Arc` when a
/// separate task needs to cancel a running cycle.
#[derive(Debug)]
pub struct ResilienceController {
    inner: Mutex<ControllerState>,
    bus: EventBus,
}

impl Default for ResilienceController {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ResilienceController {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            inner: Mutex::new(ControllerState::new(config)),
            bus: EventBus::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ReconnectConfig::default())
    }

    pub fn from_preset(preset: ReconnectPreset) -> Self {
        Self::new(preset.config())
    }

    pub fn fast() -> Self {
        Self::from_preset(ReconnectPreset::Fast)
    }

    pub fn standard() -> Self {
        Self::from_preset(ReconnectPreset::Standard)
    }

    pub fn persistent() -> Self {
        Self::from_preset(ReconnectPreset::Persistent)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate state under the lock, then publish the queued events in order
    /// with the lock released.
    fn transition<R>(&self, f: impl FnOnce(&mut ControllerState, &mut Vec<ReconnectEvent>) -> R) -> R {
        let mut events = Vec::new();
        let result = {
            let mut state = self.lock();
            f(&mut state, &mut events)
        };
        for event in &events {
            self.bus.emit(event);
        }
        result
    }

    /// Run `op` until it succeeds, fails terminally, or the cycle is cancelled.
    ///
    /// Starts a fresh cycle: any armed timer is released, the attempt
    /// counter is reset and the state becomes `Connecting`. Errors and panics
    /// from `op` are ordinary failures subject to the retry predicate.
    pub async fn connect<F, Fut, T, E>(&self, mut op: F) -> ConnectOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ConnectError>,
    {
        let cycle = self.transition(|inner, events| {
            if inner.destroyed {
                return None;
            }
            inner.cancel_timer();
            inner.cycle += 1;
            inner.attempt = 0;
            inner.reconnecting = false;
            inner.set_state(ConnectionState::Connecting, events);
            Some(inner.cycle)
        });
        let Some(cycle) = cycle else {
            warn!("connect() called on a destroyed controller, ignoring");
            return ConnectOutcome::Aborted;
        };

        let mut last_delay = Duration::ZERO;
        loop {
            let result = run_attempt(&mut op).await;

            let step = self.transition(|inner, events| {
                inner.resolve_attempt(cycle, last_delay, result, events)
            });

            let (id, delay, cancel) = match step {
                Step::Done(outcome) => return outcome,
                Step::Wait { id, delay, cancel } => (id, delay, cancel),
            };
            last_delay = delay;

            let _timer = TimerGuard { controller: self, id };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    debug!("Retry timer cancelled, leaving connect cycle");
                    return ConnectOutcome::Aborted;
                }
            }

            if !self.lock().fire_timer(id, cycle) {
                return ConnectOutcome::Aborted;
            }
        }
    }

    /// Manual retry: start over with a zeroed attempt counter.
    ///
    /// A cycle still in progress is stopped first, which reports `Abort`.
    pub async fn retry<F, Fut, T, E>(&self, op: F) -> ConnectOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ConnectError>,
    {
        let in_progress = {
            let inner = self.lock();
            inner.state.is_active() || inner.pending.is_some()
        };
        if in_progress {
            self.stop_reconnect();
        }
        info!("Manual retry requested");
        self.connect(op).await
    }

    /// Cancel the running cycle and move to `Disconnected`, emitting `Abort`.
    ///
    /// The timer is released before this returns, so no further attempt
    /// starts. Calling it again with nothing left to cancel does nothing.
    pub fn stop_reconnect(&self) {
        self.transition(|inner, events| {
            let had_timer = inner.cancel_timer();
            if !had_timer && inner.state == ConnectionState::Disconnected {
                return;
            }
            inner.cycle += 1;
            inner.reconnecting = false;
            inner.set_state(ConnectionState::Disconnected, events);
            events.push(ReconnectEvent::Abort {
                attempt: inner.attempt,
                timestamp: Utc::now(),
            });
            info!("Reconnect stopped at attempt {}", inner.attempt);
        });
    }

    /// Silently return to a pristine `Disconnected` state.
    ///
    /// Unlike [`stop_reconnect`](Self::stop_reconnect) no `Abort` is emitted;
    /// the attempt counter and last error are cleared.
    pub fn reset(&self) {
        self.transition(|inner, events| {
            inner.cancel_timer();
            inner.cycle += 1;
            inner.attempt = 0;
            inner.last_error = None;
            inner.reconnecting = false;
            inner.set_state(ConnectionState::Disconnected, events);
        });
    }

    /// Stop any cycle and drop every listener. The controller refuses new
    /// cycles afterwards.
    pub fn destroy(&self) {
        self.stop_reconnect();
        self.lock().destroyed = true;
        self.bus.clear();
        debug!("Resilience controller destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn current_attempt(&self) -> u32 {
        self.lock().attempt
    }

    pub fn last_error(&self) -> Option<ConnectError> {
        self.lock().last_error.clone()
    }

    pub fn stats(&self) -> ReconnectStats {
        let inner = self.lock();
        ReconnectStats {
            current_attempt: inner.attempt,
            max_retries: inner.config.max_retries,
            state: inner.state,
            last_error: inner.last_error.clone(),
            is_reconnecting: inner.reconnecting,
        }
    }

    pub fn config(&self) -> ReconnectConfig {
        self.lock().config.clone()
    }

    /// Merge a partial update. Takes effect from the next retry decision;
    /// an already armed timer keeps its delay.
    pub fn update_config(&self, update: ReconnectConfigUpdate) {
        update.apply_to(&mut self.lock().config);
    }

    /// Replace the configuration wholesale.
    pub fn set_config(&self, config: ReconnectConfig) {
        self.lock().config = config;
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&ReconnectEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, callback)
    }

    pub fn off(&self, kind: EventKind, id: Option<ListenerId>) -> bool {
        self.bus.off(kind, id)
    }
}

/// Releases the armed timer when a connect cycle is dropped mid-wait.
struct TimerGuard<'a> {
    controller: &'a ResilienceController,
    id: u64,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.controller.lock();
        if inner.pending.as_ref().is_some_and(|p| p.id == self.id) {
            inner.cancel_timer();
            inner.reconnecting = false;
            debug!("Connect cycle dropped while waiting, retry timer released");
        }
    }
}

/// Invoke `op` once, turning panics into ordinary failures.
async fn run_attempt<F, Fut, T, E>(op: &mut F) -> Result<T, ConnectError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ConnectError>,
{
    let future = match panic::catch_unwind(AssertUnwindSafe(|| op())) {
        Ok(future) => future,
        Err(payload) => return Err(ConnectError::from_panic(payload)),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result.map_err(Into::into),
        Err(payload) => Err(ConnectError::from_panic(payload)),
    }
}

//! Backoff delay calculation with additive jitter.

use std::time::Duration;

use rand::Rng;

use crate::reconnect::config::{BackoffStrategy, DelayFn, ReconnectConfig};

/// Upper bound of the jitter, as a fraction of the base delay.
pub const JITTER_RATIO: f64 = 0.10;

/// Delay before jitter and clamping.
///
/// `attempt` is 1-indexed: the first retry after the initial failure is 1.
pub fn base_delay(
    strategy: BackoffStrategy,
    attempt: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    custom: Option<&DelayFn>,
) -> f64 {
    let initial_ms = initial_delay.as_secs_f64() * 1000.0;
    match strategy {
        BackoffStrategy::Immediate => 0.0,
        BackoffStrategy::Linear => initial_ms * attempt as f64,
        BackoffStrategy::Exponential => {
            let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
            initial_ms * backoff_factor.powi(exponent)
        }
        BackoffStrategy::Custom => match custom {
            Some(f) => f(attempt).as_secs_f64() * 1000.0,
            None => initial_ms,
        },
    }
}

/// Full delay for `attempt` given a jitter sample in `[0, 1)`.
///
/// Jitter only ever lengthens the delay. The result never exceeds
/// `max_delay`.
pub fn delay_with_sample(config: &ReconnectConfig, attempt: u32, sample: f64) -> Duration {
    let base = base_delay(
        config.strategy,
        attempt,
        config.initial_delay,
        config.backoff_factor,
        config.custom_delay.as_ref(),
    );
    let max_ms = config.max_delay.as_secs_f64() * 1000.0;
    // Before jitter: an overflowed base times a zero sample is NaN
    if base >= max_ms {
        return config.max_delay;
    }

    let sample = if sample.is_finite() {
        sample.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let jittered = base + base * JITTER_RATIO * sample;

    if jittered >= max_ms {
        return config.max_delay;
    }
    if jittered.is_nan() || jittered <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(jittered / 1000.0)
        .map_or(config.max_delay, |delay| delay.min(config.max_delay))
}

/// Delay for `attempt` with a fresh jitter sample.
pub fn next_delay(config: &ReconnectConfig, attempt: u32) -> Duration {
    let sample: f64 = rand::thread_rng().gen();
    delay_with_sample(config, attempt, sample)
}

/// The policy's delays as an iterator, for `backon` call sites.
///
/// Yields one delay per allowed retry and then stops.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }
}

impl Iterator for ReconnectBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if !self.config.enable_auto_reconnect || self.attempt >= self.config.max_retries {
            return None;
        }
        self.attempt += 1;
        Some(next_delay(&self.config, self.attempt))
    }
}

impl backon::BackoffBuilder for ReconnectConfig {
    type Backoff = ReconnectBackoff;

    fn build(self) -> Self::Backoff {
        ReconnectBackoff::new(self)
    }
}

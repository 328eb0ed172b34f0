//! Per-host request throttling
//!
//! Every host gets a minimum interval of `1 / per_host_rps` between request
//! slots. A slot is reserved under a short lock (read the last scheduled slot,
//! compute our own, store it); the wait for that slot happens outside the lock.
//! Because the stored value is the *scheduled* instant, a burst of workers
//! hitting one host lines up on interval boundaries instead of drifting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Lower bound on the configured rate, so the interval stays finite
const MIN_RPS: f64 = 0.1;

/// Thread-safe per-host minimum-interval throttle
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_scheduled: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `per_host_rps` requests per second per host
    pub fn new(per_host_rps: f64) -> Self {
        let rps = if per_host_rps.is_finite() {
            per_host_rps.max(MIN_RPS)
        } else {
            MIN_RPS
        };

        Self {
            interval: Duration::from_secs_f64(1.0 / rps),
            last_scheduled: Mutex::new(HashMap::new()),
        }
    }

    /// The minimum spacing between two requests to the same host
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reserves the next slot for `host`, as seen at `now`
    ///
    /// Returns how long the caller must wait before its request may start.
    /// The first request to a host never waits.
    pub fn reserve_at(&self, host: &str, now: Instant) -> Duration {
        let mut slots = self
            .last_scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let delay = match slots.get(host) {
            Some(last) => (*last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        };

        slots.insert(host.to_string(), now + delay);
        delay
    }

    /// Waits until the calling worker may send a request to `host`
    pub async fn wait(&self, host: &str) {
        let delay = self.reserve_at(host, Instant::now());
        if !delay.is_zero() {
            tracing::trace!(host, delay_ms = delay.as_millis() as u64, "rate limited");
            tokio::time::sleep(delay).await;
        }
    }
}

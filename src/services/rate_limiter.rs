// src/services/rate_limiter.rs

//! Global request cadence.
//!
//! One limiter models the single upstream quota of an invocation. The grant
//! lock is held across the wait, so callers are served first-come,
//! first-served and two grants are always separated by a full interval.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::EngineConfig;

/// Enforces a minimum spacing between outbound requests.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    /// Fraction of `interval` applied as random spread (0.05 = ±5%)
    jitter: f64,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the default ±5% jitter.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            jitter: 0.05,
            last_grant: Mutex::new(None),
        }
    }

    /// Create a limiter from engine settings.
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self::new(Duration::from_secs(engine.rate_limit_secs)).with_jitter(engine.rate_limit_jitter)
    }

    /// Override the jitter fraction (clamped to `[0, 0.05]`).
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 0.05);
        self
    }

    /// Wait until the next request may be issued and record the grant.
    ///
    /// Returns how long the caller was held back. The first grant is immediate.
    pub async fn acquire(&self) -> Duration {
        let mut last_grant = self.last_grant.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(previous) = *last_grant {
            let target = self.jittered_interval();
            let elapsed = previous.elapsed();
            if elapsed < target {
                waited = target - elapsed;
                log::info!("Rate limiting: waiting {:.1}s", waited.as_secs_f64());
                tokio::time::sleep(waited).await;
            }
        }

        *last_grant = Some(Instant::now());
        waited
    }

    fn jittered_interval(&self) -> Duration {
        if self.jitter <= 0.0 {
            return self.interval;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Duration::try_from_secs_f64(self.interval.as_secs_f64() * (1.0 + spread))
            .unwrap_or(self.interval)
    }
}

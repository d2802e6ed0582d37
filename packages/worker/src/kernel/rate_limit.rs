//! Pacing for calls to the generation service.
//!
//! Every generation request waits on this limiter first. The quota is
//! shared by all jobs of a process, so concurrent jobs stay under the
//! provider's per-minute limit together.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{Quota, RateLimiter};

use crate::config::ConfigError;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
pub struct GenerationRateLimiter {
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl GenerationRateLimiter {
    /// At most `requests_per_minute` calls, with up to `burst` back to back.
    pub fn per_minute(requests_per_minute: u32, burst: u32) -> Result<Self, ConfigError> {
        let rate = NonZeroU32::new(requests_per_minute).ok_or(ConfigError::Invalid {
            name: "GENERATION_REQUESTS_PER_MINUTE",
            reason: "must be at least 1".into(),
        })?;
        let burst = NonZeroU32::new(burst).ok_or(ConfigError::Invalid {
            name: "GENERATION_BURST",
            reason: "must be at least 1".into(),
        })?;

        let quota = Quota::per_minute(rate).allow_burst(burst);
        Ok(Self {
            limiter: Some(Arc::new(RateLimiter::direct(quota))),
        })
    }

    /// No pacing at all. For tests and local runs against a stub service.
    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    /// Wait until a request may be sent.
    pub async fn until_ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for GenerationRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRateLimiter")
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn zero_rate_is_a_config_error() {
        assert!(GenerationRateLimiter::per_minute(0, 1).is_err());
        assert!(GenerationRateLimiter::per_minute(10, 0).is_err());
    }

    #[tokio::test]
    async fn burst_is_served_without_waiting() {
        let limiter = GenerationRateLimiter::per_minute(60, 3).unwrap();

        let start = Instant::now();
        for _ in 0..3 {
            limiter.until_ready().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn unlimited_never_waits() {
        let limiter = GenerationRateLimiter::unlimited();

        let start = Instant::now();
        for _ in 0..100 {
            limiter.until_ready().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}

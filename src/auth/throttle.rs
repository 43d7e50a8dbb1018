use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::minutes(15),
        }
    }
}

#[derive(Debug)]
struct AttemptWindow {
    count: u32,
    window_reset_at: DateTime<Utc>,
}

/// Per-identifier counter of failed login attempts within a fixed window.
///
/// Single-process by design: this is a defense-in-depth speed bump, not
/// the sole brute-force defense. Counters live in memory and vanish on
/// restart; a multi-instance deployment would back this with a shared
/// store. A later successful login does not clear the counter — failed
/// attempts keep counting toward the window (deliberate policy).
///
/// The gate (`attempt`) and the increment (`record_failure`) are
/// separate critical sections so the slow credential check never runs
/// under the lock. Concurrent requests for one identifier can therefore
/// each pass the gate before any of them records its failure, admitting
/// at most one extra attempt per concurrent burst past the threshold;
/// every one of those failures still lands in the counter.
pub struct LoginThrottle {
    // One mutex over the whole map so increment-and-compare for an
    // identifier is serialized. Nothing slow runs under this lock.
    windows: Mutex<HashMap<String, AttemptWindow>>,
    config: ThrottleConfig,
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Gate before verifying credentials. `Err(RateLimited)` once the
    /// identifier has crossed the threshold within the current window.
    pub async fn attempt(&self, identifier: &str) -> Result<(), Error> {
        let mut windows = self.windows.lock().await;
        let now = Utc::now();

        let elapsed = windows
            .get(identifier)
            .map(|window| now >= window.window_reset_at)
            .unwrap_or(false);
        if elapsed {
            // Lazy reset: the window elapsed, so the stale counter is
            // dropped on this attempt rather than by a background task.
            windows.remove(identifier);
            return Ok(());
        }

        match windows.get(identifier) {
            Some(window) if window.count >= self.config.max_attempts => {
                let retry_after = (window.window_reset_at - now).num_seconds().max(1) as u64;
                warn!(identifier, retry_after, "login attempts blocked");
                Err(Error::RateLimited { retry_after_secs: retry_after })
            }
            _ => Ok(()),
        }
    }

    /// Records a failed attempt. Counting happens here, not in `attempt`,
    /// so a blocked caller hammering the endpoint does not extend its own
    /// window.
    pub async fn record_failure(&self, identifier: &str) {
        let mut windows = self.windows.lock().await;
        let now = Utc::now();

        let window = windows
            .entry(identifier.to_string())
            .or_insert_with(|| AttemptWindow { count: 0, window_reset_at: now + self.config.window });

        if now >= window.window_reset_at {
            window.count = 0;
            window.window_reset_at = now + self.config.window;
        }
        window.count += 1;
    }

    /// Drops windows that have fully elapsed. Optional housekeeping; the
    /// lazy reset in `attempt` keeps correctness without it.
    pub async fn cleanup(&self) {
        let mut windows = self.windows.lock().await;
        let now = Utc::now();
        windows.retain(|_, window| now < window.window_reset_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration as TokioDuration};

    #[test_log::test(tokio::test)]
    async fn test_block_after_threshold() {
        let throttle = LoginThrottle::new(ThrottleConfig::default());

        for _ in 0..5 {
            assert!(throttle.attempt("a@x.com").await.is_ok());
            throttle.record_failure("a@x.com").await;
        }

        // 6th attempt is blocked with a retry hint
        match throttle.attempt("a@x.com").await {
            Err(Error::RateLimited { retry_after_secs }) => {
                assert!(retry_after_secs > 0);
                assert!(retry_after_secs <= 15 * 60);
            }
            other => panic!("expected rate limited, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let throttle = LoginThrottle::new(ThrottleConfig::default());

        for _ in 0..5 {
            throttle.record_failure("a@x.com").await;
        }

        assert!(throttle.attempt("a@x.com").await.is_err());
        assert!(throttle.attempt("b@x.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_reset_is_lazy() {
        let config = ThrottleConfig {
            max_attempts: 2,
            window: Duration::seconds(1),
        };
        let throttle = LoginThrottle::new(config);

        throttle.record_failure("a@x.com").await;
        throttle.record_failure("a@x.com").await;
        assert!(throttle.attempt("a@x.com").await.is_err());

        sleep(TokioDuration::from_millis(1100)).await;

        // The counter reinitializes on the next attempt after the window
        assert!(throttle.attempt("a@x.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_below_threshold_allowed() {
        let throttle = LoginThrottle::new(ThrottleConfig::default());

        for _ in 0..4 {
            throttle.record_failure("a@x.com").await;
        }
        assert!(throttle.attempt("a@x.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_drops_elapsed_windows() {
        let config = ThrottleConfig {
            max_attempts: 2,
            window: Duration::milliseconds(10),
        };
        let throttle = LoginThrottle::new(config);

        throttle.record_failure("a@x.com").await;
        sleep(TokioDuration::from_millis(50)).await;
        throttle.cleanup().await;

        let windows = throttle.windows.lock().await;
        assert!(windows.is_empty());
    }
}

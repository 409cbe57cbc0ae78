//! Rate limiter for login attempts and one-time password requests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed per window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lockout duration in seconds once the limit is hit
    pub lockout_seconds: u64,
}

impl RateLimiterConfig {
    /// Five attempts per 5 minutes, then a 15 minute lockout
    pub fn login() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            lockout_seconds: 900,
        }
    }

    /// Three codes per 10 minutes, then a 10 minute lockout
    pub fn otp() -> Self {
        Self {
            max_attempts: 3,
            window_seconds: 600,
            lockout_seconds: 600,
        }
    }
}

#[derive(Debug)]
struct Attempts {
    count: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

/// Fixed-window limiter keyed by an arbitrary string (usually an email)
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Attempts>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now()).await
    }

    async fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert(Attempts {
            count: 0,
            window_start: now,
            locked_until: None,
        });

        if let Some(locked_until) = entry.locked_until {
            if now < locked_until {
                return false;
            }
            entry.locked_until = None;
            entry.count = 0;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_attempts {
            entry.locked_until = Some(now + Duration::from_secs(self.config.lockout_seconds));
            warn!(
                "Locked out {} for {} seconds",
                key, self.config.lockout_seconds
            );
            return false;
        }

        entry.count += 1;
        true
    }

    /// Forget the attempts of `key`, e.g. after a successful login
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts,
            window_seconds: 60,
            lockout_seconds: 120,
        })
    }

    #[tokio::test]
    async fn test_blocks_after_max_attempts() {
        let limiter = limiter(2);
        let now = Instant::now();

        assert!(limiter.is_allowed_at("a@example.com", now).await);
        assert!(limiter.is_allowed_at("a@example.com", now).await);
        assert!(!limiter.is_allowed_at("a@example.com", now).await);
        assert!(limiter.is_allowed_at("b@example.com", now).await);
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.is_allowed_at("k", now).await);
        assert!(!limiter.is_allowed_at("k", now).await);
        assert!(!limiter.is_allowed_at("k", now + Duration::from_secs(119)).await);
        assert!(limiter.is_allowed_at("k", now + Duration::from_secs(121)).await);
    }

    #[tokio::test]
    async fn test_window_resets_count() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.is_allowed_at("k", now).await);
        assert!(limiter.is_allowed_at("k", now + Duration::from_secs(61)).await);
    }

    #[tokio::test]
    async fn test_reset_clears_attempts() {
        let limiter = limiter(1);

        assert!(limiter.is_allowed("k").await);
        limiter.reset("k").await;
        assert!(limiter.is_allowed("k").await);
    }
}

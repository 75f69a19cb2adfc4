use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Token-bucket rate limiter keyed by string (channel id, user id, etc.).
/// Used as the `!ping` cooldown.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    max_tokens: u32,
    refill_rate: f64, // tokens per second
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a rate limiter.
    /// - `max_tokens`: burst capacity
    /// - `per_seconds`: refill one token every N seconds
    pub fn new(max_tokens: u32, per_seconds: f64) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_rate: 1.0 / per_seconds,
        }
    }

    /// Take a token for `key`. On refusal returns how long until one is available.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.max_tokens as f64,
            last_refill: now,
        });

        // Refill tokens based on elapsed time
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewind(limiter: &RateLimiter, key: &str, by: Duration) {
        let mut buckets = limiter.buckets.lock().unwrap();
        let bucket = buckets.get_mut(key).unwrap();
        bucket.last_refill = Instant::now() - by;
    }

    #[test]
    fn test_single_use_cooldown() {
        // The ping cooldown: one use per 30 seconds per channel.
        let limiter = RateLimiter::new(1, 30.0);
        assert!(limiter.check("channel").is_ok());
        let retry = limiter.check("channel").unwrap_err();
        assert!(retry <= Duration::from_secs(30));
        assert!(retry > Duration::from_secs(29));
    }

    #[test]
    fn test_different_keys_independent() {
        let limiter = RateLimiter::new(1, 30.0);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
    }

    #[test]
    fn test_refill_over_time() {
        let limiter = RateLimiter::new(1, 30.0);
        assert!(limiter.check("channel").is_ok());
        assert!(limiter.check("channel").is_err());

        rewind(&limiter, "channel", Duration::from_secs(31));
        assert!(limiter.check("channel").is_ok());
    }

    #[test]
    fn test_retry_after_shrinks_with_elapsed_time() {
        let limiter = RateLimiter::new(1, 30.0);
        assert!(limiter.check("channel").is_ok());

        rewind(&limiter, "channel", Duration::from_secs(20));
        let retry = limiter.check("channel").unwrap_err();
        assert!(retry <= Duration::from_secs(10));
        assert!(retry > Duration::from_secs(9));
    }

    #[test]
    fn test_refill_does_not_exceed_max() {
        let limiter = RateLimiter::new(3, 1.0);
        assert!(limiter.check("user").is_ok());

        rewind(&limiter, "user", Duration::from_secs(100));

        assert!(limiter.check("user").is_ok());
        assert!(limiter.check("user").is_ok());
        assert!(limiter.check("user").is_ok());
        assert!(limiter.check("user").is_err());
    }
}

use std::time::Duration;

use rand::Rng;

/// Longest wait honoured from a `Retry-After` header.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Bounded exponential backoff with jitter, shared by every upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^(attempt-1), max)` for `attempt >= 1`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Base delay plus uniform jitter in `[0, delay/2]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let half = base.as_millis() as u64 / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=half)
        };
        base + Duration::from_millis(jitter)
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Wait requested by a 429 response, capped at [`MAX_RETRY_AFTER`].
pub fn retry_after(header: Option<&str>) -> Option<Duration> {
    let secs = header?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_millis(500));
        assert_eq!(policy.base_delay(2), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(3), Duration::from_millis(2000));
        assert_eq!(policy.base_delay(10), Duration::from_millis(30_000));
        assert_eq!(policy.base_delay(64), Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_stays_within_half_the_delay() {
        let policy = RetryPolicy::default();
        for attempt in 1..=6 {
            let base = policy.base_delay(attempt);
            for _ in 0..50 {
                let d = policy.delay(attempt);
                assert!(d >= base && d <= base + base / 2, "attempt {attempt}: {d:?}");
            }
        }
    }

    #[test]
    fn retry_after_is_capped() {
        assert_eq!(retry_after(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(retry_after(Some("3600")), Some(MAX_RETRY_AFTER));
        assert_eq!(retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(retry_after(None), None);
    }
}

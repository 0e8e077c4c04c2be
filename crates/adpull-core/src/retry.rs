//! Retry backoff for individual HTTP attempts.

use std::time::Duration;

/// Delay strategy between retries of one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed { delay: Duration },
    /// `base * 2^attempt`, capped at `max`, with optional +/- 50% jitter.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(64),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, max, jitter } => {
                let scaled = base.as_secs_f64() * 2f64.powi(attempt as i32);
                let mut delay = Duration::from_secs_f64(scaled.min(max.as_secs_f64()));

                if jitter {
                    let half = (delay.as_millis() as f64 * 0.5) as u64;
                    let offset = fastrand::u64(0..=half.saturating_mul(2));
                    let total = delay.as_millis() as i64 + offset as i64 - half as i64;
                    delay = Duration::from_millis(total.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Retry budget applied to every HTTP attempt in the pipeline.
///
/// Total attempts per request = `max_retries + 1`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub const fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Zero-delay retries for deterministic tests.
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

//! Capped exponential backoff for channel re-establishment

use std::time::Duration;

use rand::Rng;

/// Backoff schedule: `base * 2^attempt`, capped, with up to 25% jitter
///
/// Jitter spreads reconnect storms when many channels lose the same
/// transport at once.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    /// Create a schedule with the given base delay and cap
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Attempts consumed since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Next delay to sleep; advances the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(20);
        self.attempt = self.attempt.saturating_add(1);

        let unjittered = self
            .base
            .saturating_mul(1u32 << exponent)
            .min(self.cap);

        let jitter_cap = unjittered.as_millis() as u64 / 4;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_cap)
        };

        unjittered + Duration::from_millis(jitter)
    }

    /// Reset after a successful establishment
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

//! Capped exponential backoff with jitter for transient collector network
//! errors.

use std::time::Duration;

use rand::Rng;

pub struct Backoff {
    attempt: u32,
    base_ms: u64,
    cap_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, cap_ms: u64) -> Self {
        Self { attempt: 0, base_ms, cap_ms }
    }

    /// Next delay, doubling per attempt up to `cap_ms`, with up to 20%
    /// jitter so many collectors backing off at once don't retry in lockstep.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.base_ms.saturating_mul(1u64 << self.attempt.min(20));
        let capped = exp.min(self.cap_ms);
        self.attempt += 1;

        let jitter_range = (capped / 5).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_range);
        Duration::from_millis(capped + jitter)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let mut backoff = Backoff::new(100, 1000);
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second >= first);

        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_millis(1000 + 200));
        }
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut backoff = Backoff::new(100, 1000);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(100) && delay < Duration::from_millis(200));
    }
}

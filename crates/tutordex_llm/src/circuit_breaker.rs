//! Process-wide circuit breaker for the LLM endpoint.
//!
//! Grounded on `casparian_sentinel`'s per-parser health tracking
//! (`check_circuit_breaker` / `record_success` / `record_failure`,
//! `CIRCUIT_BREAKER_THRESHOLD`), adapted from a per-parser-name breaker
//! backed by the state store to a single in-process breaker backed by
//! atomics.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
    cooldown_s: u64,
    opened_at: AtomicI64,
    half_open_probe_in_flight: AtomicU32,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown_s: u64) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold,
            cooldown_s,
            opened_at: AtomicI64::new(0),
            half_open_probe_in_flight: AtomicU32::new(0),
        }
    }

    /// Current state, transitioning Open -> HalfOpen once the cooldown has
    /// elapsed (mirrors `ParserHealth::is_paused` plus a cooldown the
    /// teacher's DB-backed version lacks, since this breaker has no sweeper
    /// process to flip it back itself).
    pub fn state(&self) -> CircuitState {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        if opened_at == 0 {
            return CircuitState::Closed;
        }
        if now_unix() - opened_at >= self.cooldown_s as i64 {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Returns true if a call should proceed now, claiming the single
    /// half-open probe slot if that's the current state.
    pub fn allow_call(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => self
                .half_open_probe_in_flight
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.opened_at.store(0, Ordering::Release);
        self.half_open_probe_in_flight.store(0, Ordering::Release);
    }

    pub fn record_failure(&self) {
        self.half_open_probe_in_flight.store(0, Ordering::Release);
        let count = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= self.threshold && self.opened_at.load(Ordering::Acquire) == 0 {
            self.opened_at.store(now_unix(), Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, 60);
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_call());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, 60);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_after_cooldown_allows_single_probe() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.allow_call());
        assert!(!breaker.allow_call());
    }
}

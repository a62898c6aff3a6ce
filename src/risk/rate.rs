//! Lock-free token-bucket rate limiter.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Token bucket refilled from elapsed wall time.
///
/// Tokens accrue at `rate` per second up to `burst` and one token is
/// consumed per admitted event via a CAS loop. Callers supply the
/// current time in nanoseconds so the bucket itself stays clock-agnostic
/// (and deterministic under test).
#[derive(Debug)]
pub struct TokenBucket {
    tokens: AtomicU32,
    last_refill: AtomicU64,
    rate: u32,
    burst: u32,
}

impl TokenBucket {
    /// A bucket that starts full.
    pub fn new(rate: u32, burst: u32) -> Self {
        Self {
            tokens: AtomicU32::new(burst),
            last_refill: AtomicU64::new(0),
            rate,
            burst,
        }
    }

    /// Consume one token, refilling from elapsed time first.
    pub fn try_acquire(&self, now_nanos: u64) -> bool {
        self.refill(now_nanos);

        let mut tokens = self.tokens.load(Ordering::Relaxed);
        while tokens > 0 {
            match self.tokens.compare_exchange_weak(
                tokens,
                tokens - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => tokens = actual,
            }
        }

        false
    }

    fn refill(&self, now_nanos: u64) {
        let last = self.last_refill.load(Ordering::Relaxed);
        if now_nanos <= last {
            return;
        }

        let elapsed = now_nanos - last;
        let added = (elapsed as u128 * self.rate as u128 / 1_000_000_000) as u64;
        if added == 0 {
            return;
        }

        let current = self.tokens.load(Ordering::Relaxed);
        let refilled = (current as u64 + added).min(self.burst as u64) as u32;
        self.tokens.store(refilled, Ordering::Relaxed);
        self.last_refill.store(now_nanos, Ordering::Relaxed);
    }

    pub fn available(&self) -> u32 {
        self.tokens.load(Ordering::Relaxed)
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

//! Compact monotonic time utilities.
//!
//! Deadlines are stored as milliseconds on a process-local monotonic
//! clock, which keeps an expiry entry at 8 bytes and immune to wall
//! clock jumps.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Returns current monotonic time in milliseconds since process start.
#[inline]
pub fn now_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

/// Returns true if the given deadline has passed.
#[inline]
pub fn is_expired(deadline_ms: u64) -> bool {
    now_ms() >= deadline_ms
}

/// Converts a time-to-live into an absolute deadline.
#[inline]
pub fn deadline_after(ttl: Duration) -> u64 {
    now_ms().saturating_add(ttl.as_millis() as u64)
}

/// Returns remaining whole seconds until a deadline, rounded up so a
/// freshly set TTL of `n` seconds reads back as `n`.
#[inline]
pub fn remaining_secs(deadline_ms: u64) -> u64 {
    remaining_ms(deadline_ms).div_ceil(1000)
}

/// Returns remaining milliseconds until a deadline (0 if passed).
#[inline]
pub fn remaining_ms(deadline_ms: u64) -> u64 {
    deadline_ms.saturating_sub(now_ms())
}

//! Clock sources used by the timer engine

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::Utc;
use tokio::time::Instant;

/// Millisecond time source.
///
/// The monotonic reading must never run backward and is the only value used
/// for elapsed-time arithmetic. The wall reading is only used for absolute
/// math that has to survive a process restart.
pub trait Clock: Send + Sync {
    fn monotonic_now_ms(&self) -> u64;
    fn wall_now_ms(&self) -> i64;
}

/// Process clock backed by tokio's `Instant`, so a paused test runtime
/// drives it the same way it drives sleeps.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wall_now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    mono: AtomicU64,
    wall: AtomicI64,
}

impl ManualClock {
    pub fn new(mono_ms: u64, wall_ms: i64) -> Self {
        Self {
            mono: AtomicU64::new(mono_ms),
            wall: AtomicI64::new(wall_ms),
        }
    }

    /// Move both readings forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.mono.fetch_add(ms, Ordering::SeqCst);
        self.wall.fetch_add(ms as i64, Ordering::SeqCst);
    }

    /// Force the monotonic reading. Allowed to go backward so callers can
    /// exercise regression handling.
    pub fn set_monotonic(&self, ms: u64) {
        self.mono.store(ms, Ordering::SeqCst);
    }

    pub fn set_wall(&self, ms: i64) {
        self.wall.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn monotonic_now_ms(&self) -> u64 {
        self.mono.load(Ordering::SeqCst)
    }

    fn wall_now_ms(&self) -> i64 {
        self.wall.load(Ordering::SeqCst)
    }
}

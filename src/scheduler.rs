//! Drift-compensated tick scheduling
//!
//! Each tick is aimed at the next whole elapsed second measured from the
//! session's virtual origin (`segment start - accumulated`), never at
//! "now + 1s". A late tick therefore produces a shorter next delay and the
//! loop snaps back onto the second grid instead of accumulating drift.

use std::{future, pin::Pin, time::Duration};

use tokio::time::{sleep, Sleep};

use crate::state::{elapsed, TimerSession};

/// Smallest delay ever armed
pub const MIN_DELAY_MS: u64 = 1;

/// Delay until the next tick of a running session.
///
/// The target is the next whole elapsed second, capped at the session
/// duration so the final tick lands on completion. Returns `None` when the
/// session is not running.
pub fn next_tick_delay(session: &TimerSession, now_mono_ms: u64) -> Option<Duration> {
    let segment_start = session.start_mono_ms.filter(|_| session.is_running())?;

    let live = elapsed::live_elapsed(session, now_mono_ms);
    let next_boundary_ms = ((live / 1000 + 1) * 1000).min(session.duration_ms);

    let origin = segment_start as i128 - session.accumulated_ms as i128;
    let target = origin + next_boundary_ms as i128;
    let delay = (target - now_mono_ms as i128).max(MIN_DELAY_MS as i128);

    Some(Duration::from_millis(delay as u64))
}

/// Cancellable one-shot timer driving the control loop.
///
/// Cancelling drops the pending sleep on the spot, so a cancelled tick can
/// never fire afterwards.
#[derive(Debug, Default)]
pub struct TickTimer {
    pending: Option<Pin<Box<Sleep>>>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration) {
        self.pending = Some(Box::pin(sleep(delay)));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolves when the armed delay elapses, then disarms.
    /// Never resolves while disarmed.
    pub async fn fired(&mut self) {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.await;
                self.pending = None;
            }
            None => future::pending::<()>().await,
        }
    }
}

//! Elapsed-time accumulation across pause/resume segments

use super::TimerSession;

/// Milliseconds between `start` and `now`, treating a regressed clock as zero.
pub fn segment_delta(start_mono_ms: u64, now_mono_ms: u64) -> u64 {
    now_mono_ms.saturating_sub(start_mono_ms)
}

/// Live elapsed time: closed segments plus the open one, if any.
pub fn live_elapsed(session: &TimerSession, now_mono_ms: u64) -> u64 {
    match session.start_mono_ms {
        Some(start) if session.is_running() => {
            session.accumulated_ms + segment_delta(start, now_mono_ms)
        }
        _ => session.accumulated_ms,
    }
}

/// Accumulated value to store when leaving `Running`, clamped to the duration.
pub fn fold(session: &TimerSession, now_mono_ms: u64) -> u64 {
    live_elapsed(session, now_mono_ms).min(session.duration_ms)
}

/// Remaining time for a live elapsed value.
pub fn remaining(session: &TimerSession, now_mono_ms: u64) -> u64 {
    session
        .duration_ms
        .saturating_sub(live_elapsed(session, now_mono_ms))
}

//! Phase-boundary crossing detection and message policy
//!
//! A boundary is the `k`-th multiple (`k >= 1`) of the phase interval. Every
//! boundary strictly inside the session fires exactly once, in ascending
//! order, no matter how many of them a single late tick skipped over.
//! The boundary that coincides with the end of the session is left to the
//! completion notification.

use serde::{Deserialize, Serialize};

/// Reference phase length in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 180;

/// Title and body of a user-facing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
}

impl NotificationMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn session_started(total_minutes: u64) -> Self {
        Self::new(
            "Session started",
            format!("{total_minutes} minutes on the clock. First phase is work."),
        )
    }

    pub fn session_completed(total_minutes: u64) -> Self {
        Self::new(
            "Session complete",
            format!("All {total_minutes} minutes done. Well earned."),
        )
    }
}

/// One boundary that must be notified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryCrossing {
    pub index: u64,
    pub elapsed_seconds: u64,
    pub message: NotificationMessage,
}

/// Phase length configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPolicy {
    pub interval_secs: u64,
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl BoundaryPolicy {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs: interval_secs.max(1),
        }
    }

    /// Phase index containing `elapsed_seconds`
    pub fn phase_index(&self, elapsed_seconds: u64) -> u64 {
        elapsed_seconds / self.interval_secs
    }

    /// Boundaries crossed since the last notified one.
    ///
    /// Returns the crossings in ascending order together with the new
    /// `last_notified` value, which never decreases.
    pub fn check_boundaries(
        &self,
        previous_elapsed_seconds: u64,
        current_elapsed_seconds: u64,
        total_duration_seconds: u64,
        last_notified: Option<u64>,
    ) -> (Vec<BoundaryCrossing>, Option<u64>) {
        if current_elapsed_seconds < previous_elapsed_seconds {
            return (Vec::new(), last_notified);
        }

        let first = last_notified.map_or(1, |k| k + 1);
        let reached = current_elapsed_seconds / self.interval_secs;
        let total_minutes = total_duration_seconds / 60;

        let crossings: Vec<BoundaryCrossing> = (first..=reached)
            .map(|k| (k, k * self.interval_secs))
            .take_while(|&(_, at)| at < total_duration_seconds)
            .map(|(index, at)| BoundaryCrossing {
                index,
                elapsed_seconds: at,
                message: boundary_message(at / 60, total_minutes),
            })
            .collect();

        let newest = crossings.last().map(|c| c.index);
        (crossings, newest.max(last_notified))
    }
}

/// Pick the message for a boundary at `minute` of a `total_minutes` session.
/// First match wins.
pub fn boundary_message(minute: u64, total_minutes: u64) -> NotificationMessage {
    if minute == 3 {
        NotificationMessage::new("Nice start", "3 minutes in. Settle into the rhythm.")
    } else if minute == 6 {
        NotificationMessage::new(
            "First interval halfway",
            "6 minutes down. You are halfway through the first interval.",
        )
    } else if minute == total_minutes / 2 {
        NotificationMessage::new(
            "Halfway there",
            format!("{minute} of {total_minutes} minutes done. Keep it steady."),
        )
    } else if total_minutes >= 3 && minute == total_minutes - 3 {
        NotificationMessage::new("Almost done", "3 minutes left. Finish strong.")
    } else {
        NotificationMessage::new("Keep going", format!("{minute} minutes done."))
    }
}

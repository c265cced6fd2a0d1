//! Timer session structure and its read-only projections

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Work or rest, alternating every phase boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Work,
    Rest,
}

impl Phase {
    pub fn from_index(index: u64) -> Self {
        if index % 2 == 0 {
            Phase::Work
        } else {
            Phase::Rest
        }
    }
}

/// The single stateful entity of the engine. Only the state machine mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSession {
    pub status: SessionStatus,
    /// Total session length, fixed once started
    pub duration_ms: u64,
    /// Elapsed time of all closed running segments
    pub accumulated_ms: u64,
    /// Monotonic reading at the start of the open segment; `Some` iff running
    pub start_mono_ms: Option<u64>,
    /// Wall-clock twin of `start_mono_ms`, only used to survive restarts
    pub start_wall_ms: Option<i64>,
    /// Highest boundary index already notified
    pub last_notified_boundary: Option<u64>,
}

impl TimerSession {
    /// Create an idle session with nothing chosen yet
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            duration_ms: 0,
            accumulated_ms: 0,
            start_mono_ms: None,
            start_wall_ms: None,
            last_notified_boundary: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_ms / 1000
    }
}

impl Default for TimerSession {
    fn default() -> Self {
        Self::idle()
    }
}

/// Live read-only view handed to the UI collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub status: SessionStatus,
    pub remaining_ms: u64,
    pub elapsed_seconds: u64,
    pub current_phase_index: u64,
    pub phase: Phase,
    pub duration_ms: u64,
}

impl TimerSnapshot {
    /// Project a snapshot out of a live elapsed value
    pub fn from_elapsed(
        status: SessionStatus,
        duration_ms: u64,
        live_elapsed_ms: u64,
        interval_secs: u64,
    ) -> Self {
        let elapsed_seconds = live_elapsed_ms / 1000;
        let current_phase_index = elapsed_seconds / interval_secs.max(1);
        Self {
            status,
            remaining_ms: duration_ms.saturating_sub(live_elapsed_ms),
            elapsed_seconds,
            current_phase_index,
            phase: Phase::from_index(current_phase_index),
            duration_ms,
        }
    }

    pub fn idle() -> Self {
        Self::from_elapsed(SessionStatus::Idle, 0, 0, 1)
    }
}

/// Per-tick progress published by the control loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub remaining_ms: u64,
    pub elapsed_seconds: u64,
}

/// Immutable projection handed to the render context.
///
/// `generation` changes on every state-machine transition, so observers can
/// tell a fresh segment from the one they were already tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderAnchor {
    pub generation: u64,
    pub status: SessionStatus,
    pub base_ms: u64,
    pub anchor_mono_ms: Option<u64>,
    pub duration_ms: u64,
}

impl RenderAnchor {
    pub fn idle() -> Self {
        Self {
            generation: 0,
            status: SessionStatus::Idle,
            base_ms: 0,
            anchor_mono_ms: None,
            duration_ms: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running && self.anchor_mono_ms.is_some()
    }

    /// Live elapsed time, unclamped
    pub fn live_elapsed(&self, now_mono_ms: u64) -> u64 {
        match self.anchor_mono_ms {
            Some(anchor) if self.is_running() => self.base_ms + now_mono_ms.saturating_sub(anchor),
            _ => self.base_ms,
        }
    }

    pub fn snapshot(&self, now_mono_ms: u64, interval_secs: u64) -> TimerSnapshot {
        let live = self.live_elapsed(now_mono_ms).min(self.duration_ms);
        TimerSnapshot::from_elapsed(self.status, self.duration_ms, live, interval_secs)
    }
}

impl Default for RenderAnchor {
    fn default() -> Self {
        Self::idle()
    }
}

/// Lifecycle events broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    SessionStarted {
        duration_ms: u64,
    },
    Paused {
        elapsed_ms: u64,
    },
    Resumed {
        elapsed_ms: u64,
    },
    BoundaryReached {
        index: u64,
        elapsed_seconds: u64,
        title: String,
        body: String,
    },
    SessionCompleted {
        duration_ms: u64,
    },
    SessionEnded {
        elapsed_ms: u64,
    },
    Acknowledged,
}

impl TimerEvent {
    /// Short name used for logging and SSE event types
    pub fn name(&self) -> &'static str {
        match self {
            TimerEvent::SessionStarted { .. } => "session_started",
            TimerEvent::Paused { .. } => "paused",
            TimerEvent::Resumed { .. } => "resumed",
            TimerEvent::BoundaryReached { .. } => "boundary_reached",
            TimerEvent::SessionCompleted { .. } => "session_completed",
            TimerEvent::SessionEnded { .. } => "session_ended",
            TimerEvent::Acknowledged => "acknowledged",
        }
    }
}

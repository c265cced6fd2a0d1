//! Render synchronization
//!
//! A per-frame, read-only projection of the session used to draw the time
//! label. It works from its own copy of the render anchor and never touches
//! the state machine, except for the one-shot "reached duration" message,
//! which is handed to the control loop over its channel.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    clock::Clock,
    config::LabelMode,
    state::{RenderAnchor, SessionStatus},
};

use super::ControlMessage;

/// What one display frame shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub generation: u64,
    pub status: SessionStatus,
    pub live_ms: u64,
    pub label: String,
}

/// Format a millisecond value as `mm:ss`.
///
/// Remaining time rounds up so a fresh session reads its full length and
/// the label only shows `00:00` once the time is really up. Elapsed time
/// rounds down.
pub fn format_label(mode: LabelMode, live_ms: u64, duration_ms: u64) -> String {
    let seconds = match mode {
        LabelMode::Remaining => (duration_ms.saturating_sub(live_ms) + 999) / 1000,
        LabelMode::Elapsed => live_ms / 1000,
    };
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Shadow state of the render context
pub struct RenderSync {
    shadow: RenderAnchor,
    mode: LabelMode,
    last_live: u64,
    reached: bool,
    signalled: bool,
    control_tx: mpsc::WeakSender<ControlMessage>,
}

impl RenderSync {
    pub fn new(
        anchor: RenderAnchor,
        mode: LabelMode,
        control_tx: mpsc::WeakSender<ControlMessage>,
    ) -> Self {
        Self {
            shadow: anchor,
            mode,
            last_live: anchor.base_ms,
            reached: false,
            signalled: false,
            control_tx,
        }
    }

    pub fn anchor(&self) -> &RenderAnchor {
        &self.shadow
    }

    /// Take a newly published anchor
    pub fn refresh(&mut self, anchor: RenderAnchor) {
        if anchor.generation == self.shadow.generation {
            return;
        }

        let new_session = matches!(
            self.shadow.status,
            SessionStatus::Idle | SessionStatus::Completed
        ) || anchor.status == SessionStatus::Idle;
        if new_session {
            self.last_live = anchor.base_ms;
        }

        self.shadow = anchor;
        self.reached = false;
        self.signalled = false;
    }

    /// Compute the frame for `now_mono_ms`
    pub fn frame(&mut self, now_mono_ms: u64) -> RenderFrame {
        let mut live = self.shadow.live_elapsed(now_mono_ms);

        if self.shadow.is_running() && live >= self.shadow.duration_ms {
            live = self.shadow.duration_ms;
            // freeze locally; the control loop makes it official
            self.shadow.base_ms = live;
            self.shadow.anchor_mono_ms = None;
            self.reached = true;
        }
        if self.reached {
            self.signal_completion();
        }

        let live = live.max(self.last_live);
        self.last_live = live;

        RenderFrame {
            generation: self.shadow.generation,
            status: self.shadow.status,
            live_ms: live,
            label: format_label(self.mode, live, self.shadow.duration_ms),
        }
    }

    fn signal_completion(&mut self) {
        if self.signalled {
            return;
        }
        let Some(control_tx) = self.control_tx.upgrade() else {
            self.signalled = true;
            return;
        };

        let generation = self.shadow.generation;
        match control_tx.try_send(ControlMessage::ReachDuration { generation }) {
            Ok(()) => {
                debug!("Render context reached duration (generation {})", generation);
                self.signalled = true;
            }
            Err(TrySendError::Full(_)) => {
                debug!("Control queue full, completion signal retried next frame");
            }
            Err(TrySendError::Closed(_)) => self.signalled = true,
        }
    }
}

/// Background task producing one frame per display refresh
pub async fn render_loop(
    mut sync: RenderSync,
    mut anchor_rx: watch::Receiver<RenderAnchor>,
    clock: Arc<dyn Clock>,
    frame_tx: watch::Sender<RenderFrame>,
    frames_per_second: u32,
) {
    info!("Starting render sync at {} fps", frames_per_second);

    let mut frames = interval(Duration::from_secs(1) / frames_per_second.max(1));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        frames.tick().await;

        match anchor_rx.has_changed() {
            Ok(true) => sync.refresh(*anchor_rx.borrow_and_update()),
            Ok(false) => {}
            Err(_) => break,
        }

        let frame = sync.frame(clock.monotonic_now_ms());
        frame_tx.send_if_modified(|current| {
            if *current == frame {
                return false;
            }
            *current = frame;
            true
        });
    }

    info!("Render sync stopped");
}

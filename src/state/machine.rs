//! Timer state machine
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//! Running --reach duration--> Completed --acknowledge--> Idle
//! Running | Paused --end--> Idle
//! ```
//!
//! The machine is synchronous and owns the only mutable [`TimerSession`].
//! Scheduling lives in the control loop; every transition publishes a fresh
//! [`RenderAnchor`] for the render context and persists the session.

use std::{sync::Arc, time::Duration};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    config::EngineConfig,
    error::TimerError,
    scheduler,
    services::{
        notifier::{NotificationService, Notifier},
        store::{load_session, save_session, StateStore},
    },
};

use super::{
    boundary::{BoundaryPolicy, NotificationMessage},
    elapsed, RenderAnchor, SessionStatus, TickReport, TimerEvent, TimerSession, TimerSnapshot,
};

/// Capacity of the lifecycle event channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// User-facing transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start { minutes: u64 },
    Pause,
    Resume,
    End,
    Acknowledge,
}

pub struct TimerMachine {
    session: TimerSession,
    policy: BoundaryPolicy,
    min_minutes: u64,
    max_minutes: u64,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    store: Arc<dyn StateStore>,
    generation: u64,
    last_tick_secs: u64,
    anchor_tx: watch::Sender<RenderAnchor>,
    tick_tx: watch::Sender<TickReport>,
    event_tx: broadcast::Sender<TimerEvent>,
}

impl TimerMachine {
    /// Build a machine, restoring whatever session the store holds.
    pub fn new(
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
        notifications: Arc<dyn NotificationService>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let session = load_session(
            store.as_ref(),
            clock.monotonic_now_ms(),
            clock.wall_now_ms(),
        );
        if session.status != SessionStatus::Idle {
            info!(
                "Restored {} session: {}ms of {}ms elapsed",
                session.status, session.accumulated_ms, session.duration_ms
            );
        }

        let (anchor_tx, _) = watch::channel(RenderAnchor::idle());
        let (tick_tx, _) = watch::channel(TickReport::default());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let machine = Self {
            last_tick_secs: session.accumulated_ms / 1000,
            session,
            policy: BoundaryPolicy::new(config.interval_secs),
            min_minutes: config.min_minutes,
            max_minutes: config.max_minutes,
            clock,
            notifier: Notifier::new(notifications),
            store,
            generation: 0,
            anchor_tx,
            tick_tx,
            event_tx,
        };
        machine.publish_anchor();
        machine
    }

    // Queries

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let live = elapsed::fold(&self.session, self.clock.monotonic_now_ms());
        TimerSnapshot::from_elapsed(
            self.session.status,
            self.session.duration_ms,
            live,
            self.policy.interval_secs,
        )
    }

    pub fn render_anchor(&self) -> RenderAnchor {
        RenderAnchor {
            generation: self.generation,
            status: self.session.status,
            base_ms: self.session.accumulated_ms,
            anchor_mono_ms: self.session.start_mono_ms,
            duration_ms: self.session.duration_ms,
        }
    }

    /// Delay until the next tick, if one should be armed
    pub fn next_tick_delay(&self) -> Option<Duration> {
        scheduler::next_tick_delay(&self.session, self.clock.monotonic_now_ms())
    }

    pub fn subscribe_anchor(&self) -> watch::Receiver<RenderAnchor> {
        self.anchor_tx.subscribe()
    }

    pub fn subscribe_ticks(&self) -> watch::Receiver<TickReport> {
        self.tick_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_tx.subscribe()
    }

    // Commands

    pub fn apply(&mut self, command: Command) -> Result<TimerSnapshot, TimerError> {
        match command {
            Command::Start { minutes } => self.start(minutes)?,
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::End => self.end(),
            Command::Acknowledge => self.acknowledge(),
        }
        Ok(self.snapshot())
    }

    /// Begin a new session. Only valid from `Idle`.
    pub fn start(&mut self, minutes: u64) -> Result<(), TimerError> {
        if self.session.status != SessionStatus::Idle {
            return Err(TimerError::SessionInProgress(self.session.status));
        }
        let in_range = (self.min_minutes..=self.max_minutes).contains(&minutes);
        let duration_ms = match minutes.checked_mul(60_000) {
            Some(ms) if ms > 0 && in_range => ms,
            _ => {
                return Err(TimerError::InvalidDuration {
                    minutes,
                    min: self.min_minutes,
                    max: self.max_minutes,
                })
            }
        };

        self.session = TimerSession {
            status: SessionStatus::Running,
            duration_ms,
            accumulated_ms: 0,
            start_mono_ms: Some(self.clock.monotonic_now_ms()),
            start_wall_ms: Some(self.clock.wall_now_ms()),
            last_notified_boundary: None,
        };
        self.last_tick_secs = 0;

        info!("Session started: {} minutes", minutes);
        self.notifier
            .deliver(&NotificationMessage::session_started(minutes));
        self.emit(TimerEvent::SessionStarted {
            duration_ms: self.session.duration_ms,
        });
        self.commit();
        Ok(())
    }

    /// Close the open segment. No-op unless running.
    pub fn pause(&mut self) {
        if !self.session.is_running() {
            debug!("Pause ignored while {}", self.session.status);
            return;
        }

        let now = self.clock.monotonic_now_ms();
        if self.process_boundaries(now) >= self.session.duration_ms {
            self.complete(now);
            return;
        }

        self.session.accumulated_ms = elapsed::fold(&self.session, now);
        self.session.start_mono_ms = None;
        self.session.start_wall_ms = None;
        self.session.status = SessionStatus::Paused;

        info!("Session paused at {}ms", self.session.accumulated_ms);
        self.emit(TimerEvent::Paused {
            elapsed_ms: self.session.accumulated_ms,
        });
        self.commit();
    }

    /// Open a new segment. No-op unless paused.
    pub fn resume(&mut self) {
        if self.session.status != SessionStatus::Paused {
            debug!("Resume ignored while {}", self.session.status);
            return;
        }

        self.session.start_mono_ms = Some(self.clock.monotonic_now_ms());
        self.session.start_wall_ms = Some(self.clock.wall_now_ms());
        self.session.status = SessionStatus::Running;
        self.last_tick_secs = self.session.accumulated_ms / 1000;

        info!("Session resumed at {}ms", self.session.accumulated_ms);
        self.emit(TimerEvent::Resumed {
            elapsed_ms: self.session.accumulated_ms,
        });
        self.commit();
    }

    /// Abandon the session
    pub fn end(&mut self) {
        match self.session.status {
            SessionStatus::Idle => debug!("End ignored while idle"),
            SessionStatus::Completed => self.acknowledge(),
            SessionStatus::Running | SessionStatus::Paused => {
                let elapsed_ms = elapsed::fold(&self.session, self.clock.monotonic_now_ms());
                self.reset();

                info!("Session ended after {}ms", elapsed_ms);
                self.emit(TimerEvent::SessionEnded { elapsed_ms });
                self.commit();
            }
        }
    }

    /// Dismiss a completed session
    pub fn acknowledge(&mut self) {
        if self.session.status != SessionStatus::Completed {
            debug!("Acknowledge ignored while {}", self.session.status);
            return;
        }

        self.reset();
        info!("Completed session acknowledged");
        self.emit(TimerEvent::Acknowledged);
        self.commit();
    }

    /// One control-loop tick: notify crossed boundaries, complete if due,
    /// and return the delay to the next tick.
    pub fn tick(&mut self) -> Option<Duration> {
        if !self.session.is_running() {
            return None;
        }

        let now = self.clock.monotonic_now_ms();
        let live = self.process_boundaries(now);

        if live >= self.session.duration_ms {
            self.complete(now);
            return None;
        }

        scheduler::next_tick_delay(&self.session, now)
    }

    /// Completion signal marshalled over from the render context.
    ///
    /// Returns whether the session completed. Signals from an older
    /// generation, or arriving before the duration really elapsed on this
    /// clock, are dropped.
    pub fn reach_duration(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.session.is_running() {
            debug!(
                "Stale completion signal (generation {}, current {})",
                generation, self.generation
            );
            return false;
        }

        let now = self.clock.monotonic_now_ms();
        let live = self.process_boundaries(now);
        if live < self.session.duration_ms {
            debug!("Early completion signal at {}ms", live);
            return false;
        }

        self.complete(now);
        true
    }

    /// Write the current session to the store
    pub fn persist(&self) {
        save_session(self.store.as_ref(), &self.session, self.clock.wall_now_ms());
    }

    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    // Internal

    /// Fire notifications for every boundary crossed since the last check
    /// and publish the tick report. Returns the live elapsed milliseconds.
    fn process_boundaries(&mut self, now: u64) -> u64 {
        let live = elapsed::live_elapsed(&self.session, now);
        let current_secs = live.min(self.session.duration_ms) / 1000;

        if current_secs < self.last_tick_secs {
            warn!(
                "Elapsed time went backward ({}s -> {}s), holding position",
                self.last_tick_secs, current_secs
            );
        }

        let (crossings, last_notified) = self.policy.check_boundaries(
            self.last_tick_secs,
            current_secs,
            self.session.duration_secs(),
            self.session.last_notified_boundary,
        );

        if crossings.len() > 1 {
            info!("Catching up on {} missed phase boundaries", crossings.len());
        }
        for crossing in &crossings {
            debug!("Phase boundary {} at {}s", crossing.index, crossing.elapsed_seconds);
            self.notifier.deliver(&crossing.message);
            self.emit(TimerEvent::BoundaryReached {
                index: crossing.index,
                elapsed_seconds: crossing.elapsed_seconds,
                title: crossing.message.title.clone(),
                body: crossing.message.body.clone(),
            });
        }

        self.session.last_notified_boundary = last_notified;
        self.last_tick_secs = self.last_tick_secs.max(current_secs);
        if !crossings.is_empty() {
            self.persist();
        }

        self.tick_tx.send_replace(TickReport {
            remaining_ms: self.session.duration_ms.saturating_sub(live),
            elapsed_seconds: current_secs,
        });

        live
    }

    fn complete(&mut self, now: u64) {
        self.session.accumulated_ms = elapsed::fold(&self.session, now);
        self.session.start_mono_ms = None;
        self.session.start_wall_ms = None;
        self.session.status = SessionStatus::Completed;

        let minutes = self.session.duration_ms / 60_000;
        info!("Session completed: {} minutes", minutes);
        self.notifier
            .deliver(&NotificationMessage::session_completed(minutes));
        self.emit(TimerEvent::SessionCompleted {
            duration_ms: self.session.duration_ms,
        });
        self.commit();
    }

    fn reset(&mut self) {
        self.session = TimerSession::idle();
        self.last_tick_secs = 0;
        self.notifier.clear();
    }

    fn emit(&self, event: TimerEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    fn commit(&mut self) {
        self.generation += 1;
        self.publish_anchor();
        self.persist();
    }

    fn publish_anchor(&self) {
        self.anchor_tx.send_replace(self.render_anchor());
    }
}

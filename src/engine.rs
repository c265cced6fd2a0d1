//! Engine assembly and the handle given to UI collaborators

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::info;

use crate::{
    clock::Clock,
    config::EngineConfig,
    error::TimerError,
    services::{NotificationService, StateStore},
    state::{Command, RenderAnchor, TickReport, TimerEvent, TimerMachine, TimerSnapshot},
    tasks::{control_loop, render_loop, ControlMessage, RenderFrame, RenderSync},
};

/// Queue depth between handles and the control loop
const CONTROL_CHANNEL_CAPACITY: usize = 32;

/// Cloneable front door to a running engine.
///
/// Transitions go through the control loop; `snapshot` is computed locally
/// from the latest render anchor and never waits on it.
pub struct TimerHandle {
    control_tx: mpsc::Sender<ControlMessage>,
    anchor_rx: watch::Receiver<RenderAnchor>,
    frame_rx: watch::Receiver<RenderFrame>,
    tick_rx: watch::Receiver<TickReport>,
    event_rx: broadcast::Receiver<TimerEvent>,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
}

impl Clone for TimerHandle {
    fn clone(&self) -> Self {
        Self {
            control_tx: self.control_tx.clone(),
            anchor_rx: self.anchor_rx.clone(),
            frame_rx: self.frame_rx.clone(),
            tick_rx: self.tick_rx.clone(),
            event_rx: self.event_rx.resubscribe(),
            clock: Arc::clone(&self.clock),
            interval_secs: self.interval_secs,
        }
    }
}

/// Restore the session from `store` and spawn the control and render tasks.
///
/// Must be called from within a tokio runtime.
pub fn spawn_engine(
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    notifications: Arc<dyn NotificationService>,
    store: Arc<dyn StateStore>,
) -> TimerHandle {
    let machine = TimerMachine::new(&config, Arc::clone(&clock), notifications, store);
    let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);

    let anchor_rx = machine.subscribe_anchor();
    let tick_rx = machine.subscribe_ticks();
    let event_rx = machine.subscribe_events();

    let initial = *anchor_rx.borrow();
    let mut sync = RenderSync::new(initial, config.label_mode, control_tx.downgrade());
    let (frame_tx, frame_rx) = watch::channel(sync.frame(clock.monotonic_now_ms()));

    tokio::spawn(control_loop(machine, control_rx));
    tokio::spawn(render_loop(
        sync,
        anchor_rx.clone(),
        Arc::clone(&clock),
        frame_tx,
        config.frames_per_second,
    ));

    info!(
        "Timer engine running: {}s phases, {}-{} minute sessions",
        config.interval_secs, config.min_minutes, config.max_minutes
    );

    TimerHandle {
        control_tx,
        anchor_rx,
        frame_rx,
        tick_rx,
        event_rx,
        clock,
        interval_secs: config.interval_secs,
    }
}

impl TimerHandle {
    async fn command(&self, command: Command) -> Result<TimerSnapshot, TimerError> {
        let (reply, response) = oneshot::channel();
        self.control_tx
            .send(ControlMessage::Command { command, reply })
            .await
            .map_err(|_| TimerError::EngineStopped)?;
        response.await.map_err(|_| TimerError::EngineStopped)?
    }

    pub async fn start(&self, minutes: u64) -> Result<TimerSnapshot, TimerError> {
        self.command(Command::Start { minutes }).await
    }

    pub async fn pause(&self) -> Result<TimerSnapshot, TimerError> {
        self.command(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<TimerSnapshot, TimerError> {
        self.command(Command::Resume).await
    }

    pub async fn end(&self) -> Result<TimerSnapshot, TimerError> {
        self.command(Command::End).await
    }

    pub async fn acknowledge(&self) -> Result<TimerSnapshot, TimerError> {
        self.command(Command::Acknowledge).await
    }

    /// Live snapshot from the latest published anchor
    pub fn snapshot(&self) -> TimerSnapshot {
        self.anchor_rx
            .borrow()
            .snapshot(self.clock.monotonic_now_ms(), self.interval_secs)
    }

    /// Most recently rendered frame
    pub fn frame(&self) -> RenderFrame {
        self.frame_rx.borrow().clone()
    }

    pub fn frames(&self) -> watch::Receiver<RenderFrame> {
        self.frame_rx.clone()
    }

    pub fn ticks(&self) -> watch::Receiver<TickReport> {
        self.tick_rx.clone()
    }

    /// Lifecycle and boundary events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_rx.resubscribe()
    }

    /// Persist the session and stop the engine tasks
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self
            .control_tx
            .send(ControlMessage::Shutdown { done })
            .await
            .is_ok()
        {
            let _ = finished.await;
        }
    }
}

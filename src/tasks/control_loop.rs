//! Timer control loop background task

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{
    error::TimerError,
    scheduler::TickTimer,
    state::{Command, TimerMachine, TimerSnapshot},
};

/// Messages accepted by the control loop
#[derive(Debug)]
pub enum ControlMessage {
    /// A user transition, answered with the resulting snapshot
    Command {
        command: Command,
        reply: oneshot::Sender<Result<TimerSnapshot, TimerError>>,
    },
    /// The render context saw the running segment reach the duration
    ReachDuration { generation: u64 },
    /// Persist and stop
    Shutdown { done: oneshot::Sender<()> },
}

/// Background task that owns the state machine and its tick timer.
///
/// Commands and ticks are handled one at a time, and the pending tick is
/// always cancelled before a transition runs, so a paused or ended session
/// can never see a stray tick.
pub async fn control_loop(
    mut machine: TimerMachine,
    mut control_rx: mpsc::Receiver<ControlMessage>,
) {
    info!("Starting timer control loop");

    let mut timer = TickTimer::new();
    if machine.session().is_running() {
        // reconcile a restored session straight away
        timer.arm(std::time::Duration::ZERO);
    }

    let mut shutdown_ack = None;

    loop {
        tokio::select! {
            message = control_rx.recv() => {
                let Some(message) = message else {
                    debug!("All timer handles dropped");
                    break;
                };

                timer.cancel();
                match message {
                    ControlMessage::Command { command, reply } => {
                        debug!("Applying {:?}", command);
                        let result = machine.apply(command);
                        if reply.send(result).is_err() {
                            debug!("Caller went away before {:?} completed", command);
                        }
                    }
                    ControlMessage::ReachDuration { generation } => {
                        machine.reach_duration(generation);
                    }
                    ControlMessage::Shutdown { done } => {
                        shutdown_ack = Some(done);
                        break;
                    }
                }
                rearm(&machine, &mut timer);
            }

            _ = timer.fired() => {
                match machine.tick() {
                    Some(delay) => timer.arm(delay),
                    None => debug!("Session left running state, tick loop idle"),
                }
            }
        }
    }

    machine.persist();
    let store = machine.store();
    match tokio::task::spawn_blocking(move || store.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to flush timer state: {}", e),
        Err(e) => warn!("Timer state flush task failed: {}", e),
    }
    info!("Timer control loop stopped");
    if let Some(done) = shutdown_ack {
        let _ = done.send(());
    }
}

fn rearm(machine: &TimerMachine, timer: &mut TickTimer) {
    if let Some(delay) = machine.next_tick_delay() {
        timer.arm(delay);
    }
}

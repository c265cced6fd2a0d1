//! State management module
//!
//! This module contains the timer session, its pure arithmetic, boundary
//! policy and the state machine that mutates it.

pub mod app_state;
pub mod boundary;
pub mod elapsed;
pub mod machine;
pub mod session;

// Re-export main types
pub use app_state::AppState;
pub use boundary::{BoundaryCrossing, BoundaryPolicy, NotificationMessage};
pub use machine::{Command, TimerMachine};
pub use session::{
    Phase, RenderAnchor, SessionStatus, TickReport, TimerEvent, TimerSession, TimerSnapshot,
};

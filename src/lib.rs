//! Interval Timer - A drift-compensated interval-training timer engine
//!
//! This library provides a countdown engine for work/rest interval sessions:
//! a control loop that ticks on the true second grid and notifies phase
//! boundaries exactly once, a per-frame render projection for smooth labels,
//! and an HTTP surface to drive it.

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, EngineConfig, LabelMode};
pub use engine::{spawn_engine, TimerHandle};
pub use error::TimerError;
pub use state::{AppState, SessionStatus, TimerEvent, TimerSnapshot};
pub use utils::signals::shutdown_signal;

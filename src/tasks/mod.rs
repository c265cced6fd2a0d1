//! Background tasks module
//!
//! The engine runs as two tasks: the low-frequency control loop that owns
//! the state machine, and the per-frame render sync that only observes it.

pub mod control_loop;
pub mod render_sync;

// Re-export main functions
pub use control_loop::{control_loop, ControlMessage};
pub use render_sync::{format_label, render_loop, RenderFrame, RenderSync};

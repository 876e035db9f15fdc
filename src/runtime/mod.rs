//! # Runtime
//!
//! Process wiring: startup, the watch loops, and the error policy that turns
//! reconciliation failures into requeue decisions.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;

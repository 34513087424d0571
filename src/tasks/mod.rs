//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: fires due timers in the campus admin lookup cache

mod sweep;

pub use sweep::spawn_sweep_task;

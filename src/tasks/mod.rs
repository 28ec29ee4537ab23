//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from the in-process store

mod sweep;

pub use sweep::spawn_sweep_task;

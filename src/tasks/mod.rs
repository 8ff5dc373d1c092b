//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - TTL Cleanup: Purges expired entries from the memory and durable layers

mod cleanup;

pub use cleanup::spawn_cleanup_task;

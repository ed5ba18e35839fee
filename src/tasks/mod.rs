//! Background Tasks Module
//!
//! Contains the background tasks that run for the lifetime of a cache.
//!
//! # Tasks
//! - Active expiry: one-shot timer per TTL'd Set
//! - Oplog consumer: drains the persister's handoff channel
//! - Oplog flush: periodically writes pending records to the log stream

mod expiry;
mod flush;

pub use expiry::spawn_expiry_timer;
pub use flush::{spawn_flush_task, spawn_oplog_consumer, Oplog, MIN_FLUSH_INTERVAL};

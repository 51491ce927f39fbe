//! Offline resilience core for the inventory client.
//!
//! Keeps the application functioning when the backend is unreachable: writes
//! that fail at the transport level are captured into a durable pending
//! queue and replayed in order once connectivity returns, reads fall back to
//! a keyed response cache, and a reconnecting realtime channel delivers
//! stock alerts without flooding the user with duplicates.

pub mod api;
pub mod cache;
pub mod commands;
pub mod config;
pub mod connectivity;
pub mod core;
pub mod error;
pub mod events;
pub mod logging;
pub mod popup;
pub mod queue;
pub mod realtime;
pub mod store;
pub mod sync;

pub use crate::core::{SyncCore, SyncCoreBuilder};
pub use error::{CoreError, Result};

//! Durable queues for not-yet-acknowledged and rejected writes.

mod failed;
mod pending;
mod types;

pub use failed::FailedStore;
pub use pending::PendingQueue;
pub use types::{FailedRequest, PendingRequest};

//! Reconnecting realtime alert channel.

pub mod backoff;
mod channel;
mod dedup;
mod transport;
mod types;
mod ws;

pub use channel::AlertChannel;
pub use dedup::Deduplicator;
pub use transport::{AlertConnection, AlertTransport};
pub use types::{Alert, ConnectionState};
pub use ws::WsAlertTransport;

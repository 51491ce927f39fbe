//! Transport seam for the alert channel.
//!
//! The channel state machine only knows these two traits; the websocket
//! implementation lives in [`super::ws`] and tests substitute scripted
//! doubles.

use super::types::Alert;
use async_trait::async_trait;

/// Opens connections to the alert stream.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Box<dyn AlertConnection>>;
}

/// One live connection. `Ok(None)` is a clean close by the server; an error
/// is an abnormal drop. Both send the channel into backoff.
#[async_trait]
pub trait AlertConnection: Send {
    async fn next_alert(&mut self) -> anyhow::Result<Option<Alert>>;

    /// Verify the connection actually carries traffic. Called once right
    /// after connect; a failure counts as a failed attempt.
    async fn ping(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

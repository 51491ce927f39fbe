//! Data shapes persisted by the pending queue and failed store.

use crate::commands::WriteKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version of the persisted envelope. Bump when the serialized shape of
/// queued entries changes so old blobs are never misdecoded.
pub(crate) const QUEUE_SCHEMA_VERSION: u32 = 1;

/// A write operation awaiting transmission to the server.
///
/// `payload` is the serialized [`crate::commands::WriteCommand`] and is
/// opaque to the queue; only the sync coordinator's dispatcher decodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: Uuid,
    pub kind: WriteKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A write that was attempted and explicitly rejected by the server,
/// retained for user inspection, retry or discard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub original: PendingRequest,
    pub error_message: String,
    pub http_status: Option<u16>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<T> {
    pub version: u32,
    pub items: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            version: QUEUE_SCHEMA_VERSION,
            items,
        }
    }
}

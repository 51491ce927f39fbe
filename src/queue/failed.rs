//! Durable store of writes the server explicitly rejected.
//!
//! Entries are only ever created by the sync coordinator and only mutated
//! by explicit user action: discard, or retry (which re-enqueues a fresh
//! pending request at the back of the queue - retries never jump ahead of
//! writes that have not failed).

use super::pending::PendingQueue;
use super::types::{Envelope, FailedRequest, PendingRequest, QUEUE_SCHEMA_VERSION};
use crate::commands::WriteCommand;
use crate::error::{CoreError, Result};
use crate::store::PersistentStore;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::warn;

const STORE_KEY: &str = "queue:failed";

pub struct FailedStore {
    store: Arc<dyn PersistentStore>,
    items: Mutex<Vec<FailedRequest>>,
}

impl FailedStore {
    pub fn load(store: Arc<dyn PersistentStore>) -> Result<Self> {
        let items = match store.load_blob(STORE_KEY)? {
            Some(bytes) => {
                let envelope: Envelope<FailedRequest> = serde_json::from_slice(&bytes)?;
                if envelope.version == QUEUE_SCHEMA_VERSION {
                    envelope.items
                } else {
                    warn!(
                        version = envelope.version,
                        "failed store has unknown schema version, starting empty"
                    );
                    Vec::new()
                }
            }
            None => Vec::new(),
        };

        Ok(Self {
            store,
            items: Mutex::new(items),
        })
    }

    /// Record a rejected request with its diagnostic context. On a persist
    /// failure the in-memory list is rolled back so it never diverges from
    /// what is actually on disk.
    pub fn push(
        &self,
        original: PendingRequest,
        error_message: String,
        http_status: Option<u16>,
    ) -> Result<()> {
        let mut items = self.lock()?;
        items.push(FailedRequest {
            original,
            error_message,
            http_status,
            failed_at: Utc::now(),
        });
        if let Err(e) = self.persist(&items) {
            items.pop();
            return Err(e);
        }
        Ok(())
    }

    pub fn list_failed(&self) -> Result<Vec<FailedRequest>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Discard a failed entry.
    pub fn remove_failed_at(&self, index: usize) -> Result<Option<FailedRequest>> {
        let mut items = self.lock()?;
        if index >= items.len() {
            return Ok(None);
        }
        let removed = items.remove(index);
        self.persist(&items)?;
        Ok(Some(removed))
    }

    /// Convert a failed entry back into a fresh pending request at the tail
    /// of the queue. The entry leaves this store only after the re-enqueue
    /// has persisted, so a crash in between duplicates rather than loses.
    pub fn move_failed_to_pending(&self, index: usize, pending: &PendingQueue) -> Result<bool> {
        let mut items = self.lock()?;
        if index >= items.len() {
            return Ok(false);
        }

        let command: WriteCommand =
            serde_json::from_value(items[index].original.payload.clone())?;
        pending.enqueue(&command)?;

        items.remove(index);
        self.persist(&items)?;
        Ok(true)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<FailedRequest>>> {
        self.items.lock().map_err(|_| CoreError::lock("failed store"))
    }

    fn persist(&self, items: &[FailedRequest]) -> Result<()> {
        let envelope = Envelope::new(items.to_vec());
        let bytes = serde_json::to_vec(&envelope)?;
        self.store.save_blob(STORE_KEY, &bytes)
    }
}

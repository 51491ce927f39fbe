//! Durable FIFO of pending write operations.
//!
//! Insertion order is the replay contract: new entries always append, the
//! coordinator removes entries without ever reordering the remainder, and
//! every mutation is flushed to the persistent store before returning.

use super::types::{Envelope, PendingRequest, QUEUE_SCHEMA_VERSION};
use crate::commands::WriteCommand;
use crate::error::{CoreError, Result};
use crate::store::PersistentStore;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

const STORE_KEY: &str = "queue:pending";

pub struct PendingQueue {
    store: Arc<dyn PersistentStore>,
    items: Mutex<Vec<PendingRequest>>,
}

impl PendingQueue {
    /// Load the queue from the store. An envelope with an unknown schema
    /// version is left on disk untouched and the queue starts empty rather
    /// than guessing at its contents.
    pub fn load(store: Arc<dyn PersistentStore>) -> Result<Self> {
        let items = match store.load_blob(STORE_KEY)? {
            Some(bytes) => {
                let envelope: Envelope<PendingRequest> = serde_json::from_slice(&bytes)?;
                if envelope.version == QUEUE_SCHEMA_VERSION {
                    envelope.items
                } else {
                    warn!(
                        version = envelope.version,
                        "pending queue has unknown schema version, starting empty"
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

    /// Append a write command. Never blocks on the network; the returned
    /// request is already persisted when this returns.
    pub fn enqueue(&self, command: &WriteCommand) -> Result<PendingRequest> {
        let request = PendingRequest {
            id: Uuid::new_v4(),
            kind: command.kind(),
            payload: serde_json::to_value(command)?,
            created_at: Utc::now(),
        };

        let mut items = self.lock()?;
        items.push(request.clone());
        self.persist(&items)?;
        Ok(request)
    }

    /// Entries in insertion order.
    pub fn list_all(&self) -> Result<Vec<PendingRequest>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Remove one entry by position (manual edit from an inspection UI).
    pub fn remove_at(&self, index: usize) -> Result<Option<PendingRequest>> {
        let mut items = self.lock()?;
        if index >= items.len() {
            return Ok(None);
        }
        let removed = items.remove(index);
        self.persist(&items)?;
        Ok(Some(removed))
    }

    /// Remove one entry by id, preserving the order of the rest. Used by
    /// the coordinator, which walks a snapshot while new enqueues append.
    pub fn remove_by_id(&self, id: &Uuid) -> Result<bool> {
        let mut items = self.lock()?;
        let before = items.len();
        items.retain(|item| item.id != *id);
        if items.len() == before {
            return Ok(false);
        }
        self.persist(&items)?;
        Ok(true)
    }

    /// Replace the full contents (manual edit).
    pub fn replace_all(&self, new_items: Vec<PendingRequest>) -> Result<()> {
        let mut items = self.lock()?;
        *items = new_items;
        self.persist(&items)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<PendingRequest>>> {
        self.items.lock().map_err(|_| CoreError::lock("pending queue"))
    }

    fn persist(&self, items: &[PendingRequest]) -> Result<()> {
        let envelope = Envelope::new(items.to_vec());
        let bytes = serde_json::to_vec(&envelope)?;
        self.store.save_blob(STORE_KEY, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CategoryCreate, StockCreate};
    use crate::store::MemoryStore;

    fn category_cmd(name: &str) -> WriteCommand {
        WriteCommand::CategoryCreate(CategoryCreate {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_enqueue_preserves_order() {
        let store = Arc::new(MemoryStore::new());
        let queue = PendingQueue::load(store).unwrap();

        queue.enqueue(&category_cmd("a")).unwrap();
        queue.enqueue(&category_cmd("b")).unwrap();
        queue
            .enqueue(&WriteCommand::StockCreate(StockCreate {
                product_id: 1,
                location: "A1".to_string(),
                quantity: 4,
            }))
            .unwrap();

        let all = queue.list_all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].kind, crate::commands::WriteKind::CategoryCreate);
        assert_eq!(all[2].kind, crate::commands::WriteKind::StockCreate);
    }

    #[test]
    fn test_survives_reload() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());

        {
            let queue = PendingQueue::load(Arc::clone(&store)).unwrap();
            queue.enqueue(&category_cmd("a")).unwrap();
            queue.enqueue(&category_cmd("b")).unwrap();
        }

        let queue = PendingQueue::load(store).unwrap();
        let all = queue.list_all().unwrap();
        assert_eq!(all.len(), 2);

        // Payload decodes back into the original command
        let cmd: WriteCommand = serde_json::from_value(all[0].payload.clone()).unwrap();
        assert_eq!(cmd, category_cmd("a"));
    }

    #[test]
    fn test_remove_by_id_keeps_order() {
        let store = Arc::new(MemoryStore::new());
        let queue = PendingQueue::load(store).unwrap();

        let a = queue.enqueue(&category_cmd("a")).unwrap();
        queue.enqueue(&category_cmd("b")).unwrap();
        queue.enqueue(&category_cmd("c")).unwrap();

        assert!(queue.remove_by_id(&a.id).unwrap());
        assert!(!queue.remove_by_id(&a.id).unwrap());

        let all = queue.list_all().unwrap();
        let names: Vec<String> = all
            .iter()
            .map(|r| {
                let cmd: WriteCommand = serde_json::from_value(r.payload.clone()).unwrap();
                match cmd {
                    WriteCommand::CategoryCreate(c) => c.name,
                    _ => unreachable!(),
                }
            })
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let store = Arc::new(MemoryStore::new());
        let queue = PendingQueue::load(store).unwrap();
        queue.enqueue(&category_cmd("a")).unwrap();

        assert!(queue.remove_at(5).unwrap().is_none());
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_unknown_version_starts_empty() {
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        store
            .save_blob(STORE_KEY, br#"{"version":99,"items":[]}"#)
            .unwrap();

        let queue = PendingQueue::load(store).unwrap();
        assert!(queue.is_empty().unwrap());
    }
}

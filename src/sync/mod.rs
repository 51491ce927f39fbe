//! Sync coordinator: replays the pending queue and routes fresh writes.
//!
//! One sweep runs at a time. A sweep walks the queue front to back, sends
//! each entry, and stops at the first transport failure so ordering is
//! preserved for the next attempt. Application rejections are terminal:
//! the entry moves to the failed store and the sweep continues.

use crate::api::{ApiError, ApiResult, InventoryApi};
use crate::cache::ResponseCache;
use crate::commands::WriteCommand;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::events::{EventBus, UiEvent};
use crate::queue::{FailedStore, PendingQueue, PendingRequest};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a sweep trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep ran to completion or aborted on a transport failure.
    Ran(SweepReport),
    /// Another sweep was already in flight; this trigger did nothing.
    AlreadyRunning,
    /// The user has toggled manual offline; nothing was attempted.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Entries confirmed by the server and removed from the queue.
    pub sent: usize,
    /// Entries the server rejected, moved to the failed store.
    pub failed: usize,
    /// Entries still queued when the sweep ended.
    pub remaining: usize,
    /// True when the sweep stopped early on a transport failure.
    pub aborted: bool,
}

/// Result of routing a fresh write through [`SyncCoordinator::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Sent and confirmed immediately.
    Sent,
    /// Network unreachable; queued for a later sweep.
    Queued,
    /// The server rejected it. Surfaced directly, never queued: replaying
    /// a write the server has already refused cannot succeed.
    Rejected { status: u16, message: String },
}

pub struct SyncCoordinator {
    api: Arc<dyn InventoryApi>,
    pending: Arc<PendingQueue>,
    failed: Arc<FailedStore>,
    cache: Arc<ResponseCache>,
    connectivity: Connectivity,
    events: EventBus,
    sweep_gate: tokio::sync::Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        api: Arc<dyn InventoryApi>,
        pending: Arc<PendingQueue>,
        failed: Arc<FailedStore>,
        cache: Arc<ResponseCache>,
        connectivity: Connectivity,
        events: EventBus,
    ) -> Self {
        Self {
            api,
            pending,
            failed,
            cache,
            connectivity,
            events,
            sweep_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Route a fresh write: try the network now, queue on transport failure.
    pub async fn submit(&self, command: WriteCommand) -> Result<WriteOutcome> {
        if self.connectivity.manual_offline() {
            return self.queue_command(&command);
        }

        match dispatch(self.api.as_ref(), &command).await {
            Ok(()) => {
                self.invalidate_families(&command);
                debug!(kind = %command.kind(), "write sent directly");
                Ok(WriteOutcome::Sent)
            }
            Err(ApiError::Transport(reason)) => {
                debug!(kind = %command.kind(), reason, "write unreachable, queueing");
                self.queue_command(&command)
            }
            Err(ApiError::Rejected { status, message }) => {
                warn!(kind = %command.kind(), status, "write rejected by server");
                Ok(WriteOutcome::Rejected { status, message })
            }
        }
    }

    fn queue_command(&self, command: &WriteCommand) -> Result<WriteOutcome> {
        self.pending.enqueue(command)?;
        self.events.publish(UiEvent::WriteQueued {
            kind: command.kind(),
        });
        Ok(WriteOutcome::Queued)
    }

    /// Replay the pending queue. Re-entrant triggers are no-ops; whatever
    /// sweep is already running will pick up entries enqueued meanwhile on
    /// its snapshot walk or leave them for the next trigger.
    pub async fn sweep(&self) -> Result<SweepOutcome> {
        let Ok(_guard) = self.sweep_gate.try_lock() else {
            debug!("sweep already in flight, skipping trigger");
            return Ok(SweepOutcome::AlreadyRunning);
        };

        if self.connectivity.manual_offline() {
            return Ok(SweepOutcome::Offline);
        }

        let snapshot = self.pending.list_all()?;
        if snapshot.is_empty() {
            return Ok(SweepOutcome::Ran(SweepReport::default()));
        }

        // One cheap probe before replaying anything. A dead server would
        // otherwise cost one timeout per queued entry.
        if let Err(ApiError::Transport(reason)) = self.api.health().await {
            debug!(reason, "health probe failed, deferring sweep");
            let report = SweepReport {
                remaining: snapshot.len(),
                aborted: true,
                ..Default::default()
            };
            return Ok(SweepOutcome::Ran(report));
        }

        let mut report = SweepReport::default();
        for request in &snapshot {
            match self.replay(request).await? {
                ReplayResult::Sent => report.sent += 1,
                ReplayResult::Failed => report.failed += 1,
                ReplayResult::TransportDown => {
                    report.aborted = true;
                    break;
                }
            }
        }

        report.remaining = self.pending.len()?;
        info!(
            sent = report.sent,
            failed = report.failed,
            remaining = report.remaining,
            aborted = report.aborted,
            "sweep finished"
        );
        self.events.publish(UiEvent::SweepFinished {
            sent: report.sent,
            failed: report.failed,
            remaining: report.remaining,
        });
        Ok(SweepOutcome::Ran(report))
    }

    async fn replay(&self, request: &PendingRequest) -> Result<ReplayResult> {
        let command: WriteCommand = match serde_json::from_value(request.payload.clone()) {
            Ok(command) => command,
            Err(e) => {
                // Undecodable entry: terminal, with a synthetic diagnostic.
                // Persist into the failed store before removing; a crash in
                // between duplicates rather than loses.
                warn!(id = %request.id, error = %e, "queued payload does not decode");
                self.failed.push(
                    request.clone(),
                    format!("stored payload does not decode: {e}"),
                    None,
                )?;
                self.pending.remove_by_id(&request.id)?;
                return Ok(ReplayResult::Failed);
            }
        };

        match dispatch(self.api.as_ref(), &command).await {
            Ok(()) => {
                self.pending.remove_by_id(&request.id)?;
                self.invalidate_families(&command);
                Ok(ReplayResult::Sent)
            }
            Err(ApiError::Transport(reason)) => {
                debug!(id = %request.id, reason, "transport failure, aborting sweep");
                Ok(ReplayResult::TransportDown)
            }
            Err(ApiError::Rejected { status, message }) => {
                // Same ordering as above: the entry leaves the pending queue
                // only after the failed store has it on disk
                warn!(id = %request.id, status, "queued write rejected");
                self.failed.push(request.clone(), message, Some(status))?;
                self.pending.remove_by_id(&request.id)?;
                Ok(ReplayResult::Failed)
            }
        }
    }

    fn invalidate_families(&self, command: &WriteCommand) {
        for family in command.families() {
            if let Err(e) = self.cache.invalidate_prefix(family) {
                warn!(family, error = %e, "cache invalidation failed");
            }
        }
    }
}

enum ReplayResult {
    Sent,
    Failed,
    TransportDown,
}

/// Map a command onto the API call it represents.
async fn dispatch(api: &dyn InventoryApi, command: &WriteCommand) -> ApiResult<()> {
    match command {
        WriteCommand::ProductCreate(body) => api.create_product(body).await,
        WriteCommand::ProductUpdate { product_id, body } => {
            api.update_product(*product_id, body).await
        }
        WriteCommand::ProductDelete { product_id } => api.delete_product(*product_id).await,
        WriteCommand::StockCreate(body) => api.create_stock(body).await,
        WriteCommand::StockUpdate { stock_id, body } => api.update_stock(*stock_id, body).await,
        WriteCommand::CategoryCreate(body) => api.create_category(body).await,
        WriteCommand::ThresholdCreate(body) => api.create_threshold(body).await,
        WriteCommand::MovementIn(body) => api.movement_in(body).await,
        WriteCommand::MovementOut(body) => api.movement_out(body).await,
        WriteCommand::MovementAdjust(body) => api.movement_adjust(body).await,
        WriteCommand::MovementTransfer(body) => api.movement_transfer(body).await,
        WriteCommand::ScanEvent(body) => api.create_scan_event(body).await,
    }
}

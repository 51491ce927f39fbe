//! Composition root.
//!
//! [`SyncCore`] wires the queue, cache, coordinator, alert channel and
//! popup scheduler together over shared seams ([`InventoryApi`],
//! [`AlertTransport`], [`PersistentStore`]), so tests and alternative
//! frontends inject their own implementations instead of patching globals.

use crate::api::{
    CategoryRow, HttpInventoryApi, InventoryApi, ListQuery, MovementRow, Page, ProductRow,
    StockRow,
};
use crate::cache::{merge_page, read_through, CacheKey, MergedPage, ReadResult, ResponseCache};
use crate::commands::WriteCommand;
use crate::config::CoreConfig;
use crate::connectivity::Connectivity;
use crate::error::{CoreError, Result};
use crate::events::{EventBus, EventReceiver, UiEvent};
use crate::popup::{PopupContent, PopupScheduler};
use crate::queue::{FailedStore, PendingQueue, PendingRequest};
use crate::realtime::{AlertChannel, AlertTransport, ConnectionState, WsAlertTransport};
use crate::store::{PersistentStore, SqliteStore};
use crate::sync::{SweepOutcome, SyncCoordinator, WriteOutcome};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct SyncCoreBuilder {
    config: CoreConfig,
    store: Option<Arc<dyn PersistentStore>>,
    api: Option<Arc<dyn InventoryApi>>,
    transport: Option<Arc<dyn AlertTransport>>,
}

impl SyncCoreBuilder {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            store: None,
            api: None,
            transport: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_api(mut self, api: Arc<dyn InventoryApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn AlertTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<SyncCore> {
        let config = self.config;

        let store: Arc<dyn PersistentStore> = match self.store {
            Some(store) => store,
            None => Arc::new(SqliteStore::open_default()?),
        };

        let api: Arc<dyn InventoryApi> = match self.api {
            Some(api) => api,
            None => {
                let server_url = config.server_url.clone().ok_or_else(|| {
                    CoreError::Config("serverUrl is not configured".to_string())
                })?;
                Arc::new(HttpInventoryApi::new(server_url, config.api_token.clone()))
            }
        };

        let transport: Arc<dyn AlertTransport> = match self.transport {
            Some(transport) => transport,
            None => {
                let alerts_url = config.alerts_url.clone().ok_or_else(|| {
                    CoreError::Config("alertsUrl is not configured".to_string())
                })?;
                Arc::new(WsAlertTransport::new(alerts_url, config.api_token.clone()))
            }
        };

        let events = EventBus::default();
        let connectivity = Connectivity::new();
        let pending = Arc::new(PendingQueue::load(Arc::clone(&store))?);
        let failed = Arc::new(FailedStore::load(Arc::clone(&store))?);
        let cache = Arc::new(ResponseCache::new(
            Arc::clone(&store),
            config.cache_max_age(),
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&api),
            Arc::clone(&pending),
            Arc::clone(&failed),
            Arc::clone(&cache),
            connectivity.clone(),
            events.clone(),
        ));
        let popup = PopupScheduler::new(events.clone(), config.popup_auto_dismiss());
        let channel = Arc::new(AlertChannel::new(
            transport,
            connectivity.clone(),
            events.clone(),
            config.clone(),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(SyncCore {
            api,
            events,
            connectivity,
            pending,
            failed,
            cache,
            coordinator,
            popup,
            channel,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }
}

pub struct SyncCore {
    api: Arc<dyn InventoryApi>,
    events: EventBus,
    connectivity: Connectivity,
    pending: Arc<PendingQueue>,
    failed: Arc<FailedStore>,
    cache: Arc<ResponseCache>,
    coordinator: Arc<SyncCoordinator>,
    popup: PopupScheduler,
    channel: Arc<AlertChannel>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncCore {
    pub fn builder(config: CoreConfig) -> SyncCoreBuilder {
        SyncCoreBuilder::new(config)
    }

    /// Spawn the background tasks: the alert channel, the alert-to-popup
    /// forwarder and the reconnect sweep trigger. Idempotent start is not
    /// supported; call once.
    pub fn start(&self) {
        let shutdown = self.shutdown_tx.subscribe();
        let mut handles = Vec::new();

        {
            let channel = Arc::clone(&self.channel);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                channel.run(shutdown).await;
            }));
        }

        {
            let mut alerts = self.channel.subscribe_alerts();
            let popup = self.popup.clone();
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        next = alerts.recv() => match next {
                            Ok(alert) => popup.enqueue(PopupContent {
                                title: alert.title(),
                                body: alert.body(),
                            }),
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                                warn!(missed, "popup forwarder lagged behind alerts");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        },
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            }));
        }

        {
            let coordinator = Arc::clone(&self.coordinator);
            let events = self.events.clone();
            let mut reachable = self.connectivity.watch_reachable();
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                // Drain the queue left over from the previous run
                sweep_and_report(&coordinator, &events).await;
                loop {
                    tokio::select! {
                        changed = reachable.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            if *reachable.borrow() {
                                sweep_and_report(&coordinator, &events).await;
                            }
                        }
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            }));
        }

        match self.tasks.lock() {
            Ok(mut tasks) => tasks.extend(handles),
            Err(_) => warn!("task registry lock poisoned, handles dropped"),
        }
        info!("sync core started");
    }

    /// Signal every background task to wind down.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        info!("sync core stopping");
    }

    // Writes

    /// Route a write: sent now if the server answers, queued on transport
    /// failure, rejection surfaced as-is.
    pub async fn submit(&self, command: WriteCommand) -> Result<WriteOutcome> {
        self.coordinator.submit(command).await
    }

    /// Replay the pending queue now.
    pub async fn sweep(&self) -> Result<SweepOutcome> {
        self.coordinator.sweep().await
    }

    // Reads

    pub async fn list_products(
        &self,
        query: &ListQuery,
    ) -> Result<ReadResult<MergedPage<ProductRow>>> {
        let key = CacheKey::list("products", query);
        let page = read_through(&self.cache, &key, self.api.list_products(query)).await?;
        Ok(self.merge_pending(page, query, pending_product_rows))
    }

    pub async fn get_product(&self, product_id: i64) -> Result<ReadResult<ProductRow>> {
        let key = CacheKey::detail("products", product_id);
        Ok(read_through(&self.cache, &key, self.api.get_product(product_id)).await?)
    }

    pub async fn list_stocks(
        &self,
        query: &ListQuery,
    ) -> Result<ReadResult<MergedPage<StockRow>>> {
        let key = CacheKey::list("stocks", query);
        let page = read_through(&self.cache, &key, self.api.list_stocks(query)).await?;
        Ok(self.merge_pending(page, query, pending_stock_rows))
    }

    pub async fn list_categories(
        &self,
        query: &ListQuery,
    ) -> Result<ReadResult<MergedPage<CategoryRow>>> {
        let key = CacheKey::list("categories", query);
        let page = read_through(&self.cache, &key, self.api.list_categories(query)).await?;
        Ok(self.merge_pending(page, query, pending_category_rows))
    }

    pub async fn list_movements(
        &self,
        query: &ListQuery,
    ) -> Result<ReadResult<MergedPage<MovementRow>>> {
        let key = CacheKey::list("movements", query);
        let page = read_through(&self.cache, &key, self.api.list_movements(query)).await?;
        Ok(self.merge_pending(page, query, pending_movement_rows))
    }

    /// Overlay queued-but-unsent rows onto a remote (or cached) page so the
    /// user sees their own writes before the server confirms them.
    fn merge_pending<T: Clone>(
        &self,
        page: ReadResult<Page<T>>,
        query: &ListQuery,
        synthesize: fn(&[PendingRequest]) -> Vec<T>,
    ) -> ReadResult<MergedPage<T>> {
        let snapshot = match self.pending.list_all() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(error = %e, "pending snapshot unavailable, serving remote page as-is");
                Vec::new()
            }
        };
        let synthetic = synthesize(&snapshot);

        let merge = |page: Page<T>| {
            merge_page(&page.items, page.total, &synthetic, query.offset, query.limit)
        };

        match page {
            ReadResult::Fresh(page) => ReadResult::Fresh(merge(page)),
            ReadResult::Cached(page) => ReadResult::Cached(merge(page)),
            ReadResult::Unavailable if !synthetic.is_empty() => {
                // Nothing remote to show, but queued rows still exist
                ReadResult::Cached(merge(Page {
                    items: Vec::new(),
                    total: 0,
                }))
            }
            ReadResult::Unavailable => ReadResult::Unavailable,
        }
    }

    // Queue inspection and manual edits

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn failed(&self) -> &FailedStore {
        &self.failed
    }

    /// Re-enqueue a failed write at the back of the pending queue.
    pub fn retry_failed(&self, index: usize) -> Result<bool> {
        self.failed.move_failed_to_pending(index, &self.pending)
    }

    /// Discard a failed write for good.
    pub fn discard_failed(&self, index: usize) -> Result<bool> {
        Ok(self.failed.remove_failed_at(index)?.is_some())
    }

    // Signals and observability

    pub fn events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn popup(&self) -> &PopupScheduler {
        &self.popup
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.watch_state()
    }
}

/// Run a background-triggered sweep. A local error here (storage, not the
/// network) is worth the user's attention, unlike routine transport noise.
async fn sweep_and_report(coordinator: &SyncCoordinator, events: &EventBus) {
    match coordinator.sweep().await {
        Ok(outcome) => debug!(?outcome, "sweep trigger handled"),
        Err(e) => {
            warn!(error = %e, "sweep trigger failed");
            events.publish(UiEvent::Error {
                message: format!("Sync failed: {e}"),
            });
        }
    }
}

/// Decode queued creates into placeholder rows. Placeholders get negative
/// ids so they can never collide with a server-assigned id.
fn pending_product_rows(snapshot: &[PendingRequest]) -> Vec<ProductRow> {
    snapshot
        .iter()
        .filter_map(|request| match decode(request)? {
            WriteCommand::ProductCreate(body) => Some(ProductRow {
                id: placeholder_id(request),
                sku: body.sku,
                name: body.name,
                barcode: Some(body.barcode),
                category_id: body.category_id,
                active: body.active.unwrap_or(true),
                created_at: request.created_at,
            }),
            _ => None,
        })
        .collect()
}

fn pending_stock_rows(snapshot: &[PendingRequest]) -> Vec<StockRow> {
    snapshot
        .iter()
        .filter_map(|request| match decode(request)? {
            WriteCommand::StockCreate(body) => Some(StockRow {
                id: placeholder_id(request),
                product_id: body.product_id,
                location: body.location,
                quantity: body.quantity,
                created_at: request.created_at,
            }),
            _ => None,
        })
        .collect()
}

fn pending_category_rows(snapshot: &[PendingRequest]) -> Vec<CategoryRow> {
    snapshot
        .iter()
        .filter_map(|request| match decode(request)? {
            WriteCommand::CategoryCreate(body) => Some(CategoryRow {
                id: placeholder_id(request),
                name: body.name,
                created_at: request.created_at,
            }),
            _ => None,
        })
        .collect()
}

fn pending_movement_rows(snapshot: &[PendingRequest]) -> Vec<MovementRow> {
    snapshot
        .iter()
        .filter_map(|request| {
            let (movement_type, op) = match decode(request)? {
                WriteCommand::MovementIn(op) => ("in", op),
                WriteCommand::MovementOut(op) => ("out", op),
                WriteCommand::MovementAdjust(op) => ("adjust", op),
                _ => return None,
            };
            Some(MovementRow {
                id: placeholder_id(request),
                product_id: op.product_id,
                quantity: op.quantity,
                movement_type: movement_type.to_string(),
                movement_source: op.movement_source,
                created_at: request.created_at,
            })
        })
        .collect()
}

fn decode(request: &PendingRequest) -> Option<WriteCommand> {
    serde_json::from_value(request.payload.clone()).ok()
}

fn placeholder_id(request: &PendingRequest) -> i64 {
    // Low 62 bits of the request uuid, negated
    -((request.id.as_u128() as i64 & i64::MAX).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiResult};
    use crate::commands::{ProductCreate, StockCreate};
    use crate::realtime::AlertConnection;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StaticApi {
        down: AtomicBool,
        products: Page<ProductRow>,
    }

    impl StaticApi {
        fn new(products: Page<ProductRow>) -> Self {
            Self {
                down: AtomicBool::new(false),
                products,
            }
        }

        fn fail_if_down<T>(&self, value: T) -> ApiResult<T> {
            if self.down.load(Ordering::SeqCst) {
                Err(ApiError::Transport("offline".to_string()))
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl InventoryApi for StaticApi {
        async fn health(&self) -> ApiResult<()> {
            self.fail_if_down(())
        }

        async fn create_product(&self, _: &ProductCreate) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn update_product(
            &self,
            _: i64,
            _: &crate::commands::ProductUpdate,
        ) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn delete_product(&self, _: i64) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn create_stock(&self, _: &StockCreate) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn update_stock(&self, _: i64, _: &crate::commands::StockUpdate) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn create_category(&self, _: &crate::commands::CategoryCreate) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn create_threshold(&self, _: &crate::commands::ThresholdCreate) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn movement_in(&self, _: &crate::commands::MovementOperation) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn movement_out(&self, _: &crate::commands::MovementOperation) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn movement_adjust(&self, _: &crate::commands::MovementOperation) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn movement_transfer(&self, _: &crate::commands::MovementTransfer) -> ApiResult<()> {
            self.fail_if_down(())
        }
        async fn create_scan_event(&self, _: &crate::commands::ScanEvent) -> ApiResult<()> {
            self.fail_if_down(())
        }

        async fn list_products(&self, _: &ListQuery) -> ApiResult<Page<ProductRow>> {
            self.fail_if_down(self.products.clone())
        }
        async fn get_product(&self, _: i64) -> ApiResult<ProductRow> {
            Err(ApiError::Rejected {
                status: 404,
                message: "not found".to_string(),
            })
        }
        async fn list_stocks(&self, _: &ListQuery) -> ApiResult<Page<StockRow>> {
            self.fail_if_down(Page {
                items: Vec::new(),
                total: 0,
            })
        }
        async fn list_categories(&self, _: &ListQuery) -> ApiResult<Page<CategoryRow>> {
            self.fail_if_down(Page {
                items: Vec::new(),
                total: 0,
            })
        }
        async fn list_movements(&self, _: &ListQuery) -> ApiResult<Page<MovementRow>> {
            self.fail_if_down(Page {
                items: Vec::new(),
                total: 0,
            })
        }
    }

    struct NeverTransport;

    #[async_trait]
    impl AlertTransport for NeverTransport {
        async fn connect(&self) -> anyhow::Result<Box<dyn AlertConnection>> {
            anyhow::bail!("no realtime in this test")
        }
    }

    fn remote_product(id: i64, name: &str) -> ProductRow {
        ProductRow {
            id,
            sku: format!("SKU-{id}"),
            name: name.to_string(),
            barcode: None,
            category_id: 1,
            active: true,
            created_at: chrono::Utc::now(),
        }
    }

    fn core(api: Arc<StaticApi>) -> SyncCore {
        SyncCore::builder(CoreConfig::default())
            .with_store(Arc::new(MemoryStore::new()))
            .with_api(api)
            .with_transport(Arc::new(NeverTransport))
            .build()
            .unwrap()
    }

    fn product_cmd(name: &str) -> WriteCommand {
        WriteCommand::ProductCreate(ProductCreate {
            sku: format!("SKU-{name}"),
            name: name.to_string(),
            barcode: "123".to_string(),
            category_id: 1,
            active: None,
        })
    }

    #[tokio::test]
    async fn test_list_appends_queued_rows_after_remote_total() {
        let api = Arc::new(StaticApi::new(Page {
            items: vec![remote_product(1, "bolt"), remote_product(2, "nut")],
            total: 2,
        }));
        let core = core(Arc::clone(&api));

        // Queue a product while offline, then come back for the read
        api.down.store(true, Ordering::SeqCst);
        assert_eq!(
            core.submit(product_cmd("washer")).await.unwrap(),
            WriteOutcome::Queued
        );
        api.down.store(false, Ordering::SeqCst);

        let result = core.list_products(&ListQuery::page(25, 0)).await.unwrap();
        let ReadResult::Fresh(page) = result else {
            panic!("expected a fresh page");
        };
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[2].name, "washer");
        assert!(page.items[2].id < 0);
    }

    #[tokio::test]
    async fn test_offline_cold_cache_still_shows_queued_rows() {
        let api = Arc::new(StaticApi::new(Page {
            items: Vec::new(),
            total: 0,
        }));
        let core = core(Arc::clone(&api));

        api.down.store(true, Ordering::SeqCst);
        core.submit(product_cmd("washer")).await.unwrap();

        let result = core.list_products(&ListQuery::page(25, 0)).await.unwrap();
        let ReadResult::Cached(page) = result else {
            panic!("expected queued rows served as cached");
        };
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "washer");
    }

    #[tokio::test]
    async fn test_offline_read_falls_back_to_cache_with_overlay() {
        let api = Arc::new(StaticApi::new(Page {
            items: vec![remote_product(1, "bolt")],
            total: 1,
        }));
        let core = core(Arc::clone(&api));

        // Warm the cache, then go dark and queue a write
        core.list_products(&ListQuery::page(25, 0)).await.unwrap();
        api.down.store(true, Ordering::SeqCst);
        core.submit(product_cmd("washer")).await.unwrap();

        let result = core.list_products(&ListQuery::page(25, 0)).await.unwrap();
        let ReadResult::Cached(page) = result else {
            panic!("expected the cached page");
        };
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "bolt");
        assert_eq!(page.items[1].name, "washer");
    }

    #[tokio::test]
    async fn test_sweep_clears_queue_and_overlay() {
        let api = Arc::new(StaticApi::new(Page {
            items: Vec::new(),
            total: 0,
        }));
        let core = core(Arc::clone(&api));

        api.down.store(true, Ordering::SeqCst);
        core.submit(product_cmd("washer")).await.unwrap();
        api.down.store(false, Ordering::SeqCst);

        let SweepOutcome::Ran(report) = core.sweep().await.unwrap() else {
            panic!("expected a completed sweep");
        };
        assert_eq!(report.sent, 1);
        assert!(core.pending().is_empty().unwrap());

        let result = core.list_products(&ListQuery::page(25, 0)).await.unwrap();
        let ReadResult::Fresh(page) = result else {
            panic!("expected a fresh page");
        };
        assert_eq!(page.total, 0);
    }

    struct BlockedPendingStore {
        inner: MemoryStore,
        blocked: AtomicBool,
    }

    impl crate::store::PersistentStore for BlockedPendingStore {
        fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.load_blob(key)
        }

        fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
            if key == "queue:pending" && self.blocked.load(Ordering::SeqCst) {
                return Err(CoreError::Other("disk full".to_string()));
            }
            self.inner.save_blob(key, bytes)
        }

        fn delete_blob(&self, key: &str) -> Result<()> {
            self.inner.delete_blob(key)
        }

        fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list_keys(prefix)
        }
    }

    #[tokio::test]
    async fn test_failed_sweep_trigger_publishes_error_event() {
        let store = Arc::new(BlockedPendingStore {
            inner: MemoryStore::new(),
            blocked: AtomicBool::new(false),
        });
        let api = Arc::new(StaticApi::new(Page {
            items: Vec::new(),
            total: 0,
        }));
        let core = SyncCore::builder(CoreConfig::default())
            .with_store(Arc::clone(&store) as Arc<dyn crate::store::PersistentStore>)
            .with_api(Arc::clone(&api) as Arc<dyn InventoryApi>)
            .with_transport(Arc::new(NeverTransport))
            .build()
            .unwrap();

        api.down.store(true, Ordering::SeqCst);
        core.submit(product_cmd("washer")).await.unwrap();
        api.down.store(false, Ordering::SeqCst);

        // The replay succeeds remotely but the queue cannot persist the
        // removal, which fails the sweep locally
        store.blocked.store(true, Ordering::SeqCst);
        let mut events = core.events();
        sweep_and_report(&core.coordinator, &core.events).await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event.payload, UiEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_missing_server_url_is_a_config_error() {
        let result = SyncCore::builder(CoreConfig::default())
            .with_store(Arc::new(MemoryStore::new()))
            .with_transport(Arc::new(NeverTransport))
            .build();
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_detail_rejection_propagates() {
        let api = Arc::new(StaticApi::new(Page {
            items: Vec::new(),
            total: 0,
        }));
        let core = core(api);

        let result = core.get_product(99).await;
        assert!(matches!(
            result,
            Err(CoreError::Api(ApiError::Rejected { status: 404, .. }))
        ));
    }
}

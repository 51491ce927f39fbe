//! Remote API boundary.
//!
//! The core only sees [`InventoryApi`]: one operation per write kind plus
//! one per cached read family. Outcomes are split into the two classes the
//! replay logic cares about - a transport failure (no usable response, safe
//! to retry later) and an application rejection (a response was received and
//! the operation itself is invalid).

pub mod http;

pub use http::HttpInventoryApi;

use crate::commands::{
    CategoryCreate, MovementOperation, MovementTransfer, ProductCreate, ProductUpdate, ScanEvent,
    StockCreate, StockUpdate, ThresholdCreate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome taxonomy for remote calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No usable response: connectivity, timeout, server unreachable.
    /// The operation may have never reached the server; retry later.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server received and rejected the operation. Not retryable.
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Canonical list query: absent parameters must not vary cache keys, so
/// this is the single shape every list read goes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl ListQuery {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            name: None,
            limit,
            offset,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One page of a remote list plus the server-reported grand total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub barcode: Option<String>,
    pub category_id: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub id: i64,
    pub product_id: i64,
    pub location: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRow {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub movement_type: String,
    pub movement_source: String,
    pub created_at: DateTime<Utc>,
}

/// Remote inventory API consumed by the core.
///
/// Implementations map their transport errors into [`ApiError::Transport`]
/// and non-2xx responses into [`ApiError::Rejected`]; see [`http`] for the
/// production adapter.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Cheap reachability probe, used to gate a sweep.
    async fn health(&self) -> ApiResult<()>;

    // Writes, one per WriteKind
    async fn create_product(&self, body: &ProductCreate) -> ApiResult<()>;
    async fn update_product(&self, product_id: i64, body: &ProductUpdate) -> ApiResult<()>;
    async fn delete_product(&self, product_id: i64) -> ApiResult<()>;
    async fn create_stock(&self, body: &StockCreate) -> ApiResult<()>;
    async fn update_stock(&self, stock_id: i64, body: &StockUpdate) -> ApiResult<()>;
    async fn create_category(&self, body: &CategoryCreate) -> ApiResult<()>;
    async fn create_threshold(&self, body: &ThresholdCreate) -> ApiResult<()>;
    async fn movement_in(&self, body: &MovementOperation) -> ApiResult<()>;
    async fn movement_out(&self, body: &MovementOperation) -> ApiResult<()>;
    async fn movement_adjust(&self, body: &MovementOperation) -> ApiResult<()>;
    async fn movement_transfer(&self, body: &MovementTransfer) -> ApiResult<()>;
    async fn create_scan_event(&self, body: &ScanEvent) -> ApiResult<()>;

    // Cached read families
    async fn list_products(&self, query: &ListQuery) -> ApiResult<Page<ProductRow>>;
    async fn get_product(&self, product_id: i64) -> ApiResult<ProductRow>;
    async fn list_stocks(&self, query: &ListQuery) -> ApiResult<Page<StockRow>>;
    async fn list_categories(&self, query: &ListQuery) -> ApiResult<Page<CategoryRow>>;
    async fn list_movements(&self, query: &ListQuery) -> ApiResult<Page<MovementRow>>;
}

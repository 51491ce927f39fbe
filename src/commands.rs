//! Strongly typed write commands queued for replay.
//!
//! Each queued entry carries one [`WriteCommand`] serialized as a tagged
//! JSON object; the tag survives schema evolution and a version field on the
//! queue envelope prevents silently misdecoding old entries. Payload shapes
//! follow the backend API schemas.

use serde::{Deserialize, Serialize};

/// Closed enumeration of write operations the queue can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    StockCreate,
    StockUpdate,
    CategoryCreate,
    ThresholdCreate,
    MovementIn,
    MovementOut,
    MovementAdjust,
    MovementTransfer,
    ScanEvent,
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WriteKind::ProductCreate => "product_create",
            WriteKind::ProductUpdate => "product_update",
            WriteKind::ProductDelete => "product_delete",
            WriteKind::StockCreate => "stock_create",
            WriteKind::StockUpdate => "stock_update",
            WriteKind::CategoryCreate => "category_create",
            WriteKind::ThresholdCreate => "threshold_create",
            WriteKind::MovementIn => "movement_in",
            WriteKind::MovementOut => "movement_out",
            WriteKind::MovementAdjust => "movement_adjust",
            WriteKind::MovementTransfer => "movement_transfer",
            WriteKind::ScanEvent => "scan_event",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreate {
    pub sku: String,
    pub name: String,
    pub barcode: String,
    pub category_id: i64,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCreate {
    pub product_id: i64,
    pub location: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StockUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCreate {
    pub product_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub min_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementOperation {
    pub product_id: i64,
    pub quantity: i64,
    pub movement_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementTransfer {
    pub product_id: i64,
    pub quantity: i64,
    pub from_location: String,
    pub to_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub event_type: String,
    pub product_id: i64,
    pub delta: i64,
    pub source: String,
}

/// Tagged union of every write the client can queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteCommand {
    ProductCreate(ProductCreate),
    ProductUpdate { product_id: i64, body: ProductUpdate },
    ProductDelete { product_id: i64 },
    StockCreate(StockCreate),
    StockUpdate { stock_id: i64, body: StockUpdate },
    CategoryCreate(CategoryCreate),
    ThresholdCreate(ThresholdCreate),
    MovementIn(MovementOperation),
    MovementOut(MovementOperation),
    MovementAdjust(MovementOperation),
    MovementTransfer(MovementTransfer),
    ScanEvent(ScanEvent),
}

impl WriteCommand {
    pub fn kind(&self) -> WriteKind {
        match self {
            WriteCommand::ProductCreate(_) => WriteKind::ProductCreate,
            WriteCommand::ProductUpdate { .. } => WriteKind::ProductUpdate,
            WriteCommand::ProductDelete { .. } => WriteKind::ProductDelete,
            WriteCommand::StockCreate(_) => WriteKind::StockCreate,
            WriteCommand::StockUpdate { .. } => WriteKind::StockUpdate,
            WriteCommand::CategoryCreate(_) => WriteKind::CategoryCreate,
            WriteCommand::ThresholdCreate(_) => WriteKind::ThresholdCreate,
            WriteCommand::MovementIn(_) => WriteKind::MovementIn,
            WriteCommand::MovementOut(_) => WriteKind::MovementOut,
            WriteCommand::MovementAdjust(_) => WriteKind::MovementAdjust,
            WriteCommand::MovementTransfer(_) => WriteKind::MovementTransfer,
            WriteCommand::ScanEvent(_) => WriteKind::ScanEvent,
        }
    }

    /// Resource families whose cached reads become stale once this write is
    /// confirmed by the server.
    pub fn families(&self) -> &'static [&'static str] {
        match self {
            WriteCommand::ProductCreate(_)
            | WriteCommand::ProductUpdate { .. }
            | WriteCommand::ProductDelete { .. } => &["products"],
            WriteCommand::StockCreate(_) | WriteCommand::StockUpdate { .. } => &["stocks"],
            WriteCommand::CategoryCreate(_) => &["categories"],
            WriteCommand::ThresholdCreate(_) => &["thresholds"],
            // Movements mutate stock levels as a side effect
            WriteCommand::MovementIn(_)
            | WriteCommand::MovementOut(_)
            | WriteCommand::MovementAdjust(_)
            | WriteCommand::MovementTransfer(_) => &["movements", "stocks"],
            WriteCommand::ScanEvent(_) => &["events", "stocks"],
        }
    }
}

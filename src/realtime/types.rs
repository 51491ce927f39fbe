use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Low-stock alert as pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub stock_id: i64,
    pub quantity: i64,
    pub min_quantity: i64,
    pub alert_status: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Identity for deduplication. Two alerts for the same stock row at the
    /// same status and quantity are the same alert, regardless of server id.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}:{}", self.stock_id, self.alert_status, self.quantity)
    }

    pub fn title(&self) -> String {
        match self.alert_status.as_str() {
            "out_of_stock" => "Out of stock".to_string(),
            _ => "Low stock".to_string(),
        }
    }

    pub fn body(&self) -> String {
        format!(
            "Stock #{} at {} (minimum {})",
            self.stock_id, self.quantity, self.min_quantity
        )
    }
}

/// Lifecycle of the alert channel, observable via a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    BackingOff,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct InventoryItem {
    pub id: u64,
    pub name: String,
    pub category_id: Option<u64>,
    pub current_stock: i32,
    pub min_threshold: i32,
    pub max_threshold: Option<i32>,
    pub unit_price: f64,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct InventoryCategory {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionKind {
    In,
    Out,
    Adjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct InventoryTransaction {
    pub id: u64,
    pub item_id: u64,
    /// Signed stock delta.
    pub quantity: i32,
    pub kind: String,
    pub service_id: Option<u64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Retail catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub inventory_item_id: Option<u64>,
}

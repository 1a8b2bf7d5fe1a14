use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Alert {
    pub id: u64,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    /// Table name of the entity the alert refers to, e.g. `inventory_items`.
    pub related_table: Option<String>,
    pub related_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

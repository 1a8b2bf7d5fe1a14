use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Jane Roe",
        "phone": "+15551234567",
        "email": "jane@example.com",
        "preferred_style": "bob cut",
        "hair_type": "curly",
        "notes": "prefers morning slots",
        "owner_id": 7,
        "created_at": "2026-01-01T10:00:00Z"
    })
)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub preferred_style: Option<String>,
    pub hair_type: Option<String>,
    pub notes: Option<String>,
    /// User that created the record.
    pub owner_id: u64,
    pub created_at: DateTime<Utc>,
}

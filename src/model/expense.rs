use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Expense {
    pub id: u64,
    pub category: String,
    pub description: Option<String>,
    pub amount: f64,
    pub expense_date: NaiveDate,
    pub owner_id: u64,
    pub created_at: DateTime<Utc>,
}

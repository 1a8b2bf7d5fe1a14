use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "name": "Sam Stylist",
        "role": "senior stylist",
        "phone": "+15550001111",
        "salary": 2400.0,
        "payment_status": "pending",
        "hire_date": "2024-03-01",
        "total_earnings": 815.5,
        "created_at": "2024-03-01T09:00:00Z"
    })
)]
pub struct Worker {
    pub id: u64,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub salary: f64,
    pub payment_status: String,
    pub hire_date: NaiveDate,
    pub total_earnings: f64,
    pub created_at: DateTime<Utc>,
}

/// Commission credited to a worker for one completed service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkerEarning {
    pub id: u64,
    pub worker_id: u64,
    pub service_id: u64,
    pub amount: f64,
    pub commission_rate: f64,
    pub created_at: DateTime<Utc>,
}

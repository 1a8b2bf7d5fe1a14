use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ServiceStatus {
    /// Completed and cancelled services are final.
    pub fn is_open(self) -> bool {
        matches!(self, ServiceStatus::Pending | ServiceStatus::InProgress)
    }

    /// Manual transitions. `Completed` is only reachable through the
    /// completion workflow.
    pub fn can_transition_to(self, next: ServiceStatus) -> bool {
        self.is_open() && next != ServiceStatus::Completed
    }
}

/// A billable salon appointment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Service {
    pub id: u64,
    pub customer_id: u64,
    pub worker_id: Option<u64>,
    pub service_name: String,
    pub price: f64,
    pub status: String,
    pub commission_rate: Option<f64>,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: u64,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn status(&self) -> Result<ServiceStatus, AppError> {
        ServiceStatus::from_str(&self.status)
            .map_err(|_| AppError::Internal(format!("unknown service status '{}'", self.status)))
    }

    /// Commission owed to the worker, if the service carries one.
    pub fn commission(&self) -> Option<(u64, f64, f64)> {
        match (self.worker_id, self.commission_rate) {
            (Some(worker_id), Some(rate)) if rate > 0.0 => {
                Some((worker_id, rate, self.price * rate / 100.0))
            }
            _ => None,
        }
    }
}

/// Inventory consumed by a service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ServiceItem {
    pub id: u64,
    pub service_id: u64,
    pub item_id: u64,
    pub quantity: i32,
    pub unit_price: f64,
    pub line_total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(worker_id: Option<u64>, rate: Option<f64>) -> Service {
        Service {
            id: 1,
            customer_id: 1,
            worker_id,
            service_name: "Colour".into(),
            price: 120.0,
            status: "in_progress".into(),
            commission_rate: rate,
            scheduled_at: Utc::now(),
            notes: None,
            created_by: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn commission_needs_worker_and_rate() {
        assert_eq!(service(Some(4), Some(25.0)).commission(), Some((4, 25.0, 30.0)));
        assert_eq!(service(None, Some(25.0)).commission(), None);
        assert_eq!(service(Some(4), None).commission(), None);
        assert_eq!(service(Some(4), Some(0.0)).commission(), None);
    }

    #[test]
    fn manual_transitions_never_complete() {
        assert!(ServiceStatus::Pending.can_transition_to(ServiceStatus::InProgress));
        assert!(ServiceStatus::InProgress.can_transition_to(ServiceStatus::Cancelled));
        assert!(!ServiceStatus::InProgress.can_transition_to(ServiceStatus::Completed));
        assert!(!ServiceStatus::Cancelled.can_transition_to(ServiceStatus::Pending));
        assert!(!ServiceStatus::Completed.can_transition_to(ServiceStatus::InProgress));
    }

    #[test]
    fn status_parses_snake_case() {
        assert_eq!(service(None, None).status().unwrap(), ServiceStatus::InProgress);
        assert_eq!(ServiceStatus::InProgress.as_ref(), "in_progress");
    }
}

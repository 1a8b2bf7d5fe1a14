//! Service completion gated on inventory sufficiency.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::realtime::bus::{BusEvent, EventBus};
use crate::repository::InventoryGateway;
use crate::utils::error_hints;

/// Required vs. available stock for one inventory item of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, sqlx::FromRow)]
pub struct AvailabilityLine {
    pub item_id: u64,
    pub item_name: String,
    pub required_quantity: i64,
    pub available_stock: i64,
}

impl AvailabilityLine {
    pub fn is_sufficient(&self) -> bool {
        self.available_stock >= self.required_quantity
    }

    pub fn shortage(&self) -> i64 {
        (self.required_quantity - self.available_stock).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Shortage {
    pub item_id: u64,
    pub item_name: String,
    pub required_quantity: i64,
    pub available_stock: i64,
    pub shortage: i64,
}

impl From<&AvailabilityLine> for Shortage {
    fn from(line: &AvailabilityLine) -> Self {
        Shortage {
            item_id: line.item_id,
            item_name: line.item_name.clone(),
            required_quantity: line.required_quantity,
            available_stock: line.available_stock,
            shortage: line.shortage(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AvailabilityReport {
    pub service_id: u64,
    pub lines: Vec<AvailabilityLine>,
}

impl AvailabilityReport {
    pub fn shortages(&self) -> Vec<Shortage> {
        self.lines
            .iter()
            .filter(|line| !line.is_sufficient())
            .map(Shortage::from)
            .collect()
    }

    /// True iff every line has enough stock.
    pub fn can_complete(&self) -> bool {
        self.lines.iter().all(AvailabilityLine::is_sufficient)
    }
}

/// Result of the guarded stock deduction that completes a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDeduction {
    Completed,
    /// Stock moved since the check; nothing was written.
    Short(Vec<AvailabilityLine>),
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionCheck {
    /// The service uses no inventory and can be completed directly.
    NoItems,
    Items { report: AvailabilityReport },
}

impl CompletionCheck {
    pub fn can_complete(&self) -> bool {
        match self {
            CompletionCheck::NoItems => true,
            CompletionCheck::Items { report } => report.can_complete(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EarningsOutcome {
    Recorded { worker_id: u64, amount: f64 },
    Skipped,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CompletionOutcome {
    pub service_id: u64,
    pub deducted_items: Vec<u64>,
    pub earnings: EarningsOutcome,
}

#[derive(Debug, Display)]
pub enum CompletionError {
    #[display(fmt = "Service {} not found", _0)]
    NotFound(u64),
    #[display(fmt = "Service {} cannot be completed from status '{}'", _0, _1)]
    InvalidStatus(u64, String),
    #[display(fmt = "Insufficient stock for {} item(s)", "_0.len()")]
    InsufficientStock(Vec<Shortage>),
    #[display(fmt = "{}", _0)]
    Backend(AppError),
}

impl std::error::Error for CompletionError {}

impl From<AppError> for CompletionError {
    fn from(err: AppError) -> Self {
        CompletionError::Backend(err)
    }
}

impl ResponseError for CompletionError {
    fn status_code(&self) -> StatusCode {
        match self {
            CompletionError::NotFound(_) => StatusCode::NOT_FOUND,
            CompletionError::InvalidStatus(..) | CompletionError::InsufficientStock(_) => {
                StatusCode::CONFLICT
            }
            CompletionError::Backend(e) => e.status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            CompletionError::InsufficientStock(shortages) => {
                HttpResponse::Conflict().json(json!({
                    "error": "insufficient_stock",
                    "message": self.to_string(),
                    "hint": error_hints::describe("insufficient stock"),
                    "shortages": shortages,
                }))
            }
            CompletionError::Backend(e) => e.error_response(),
            other => HttpResponse::build(other.status_code()).json(json!({
                "error": "completion_refused",
                "message": other.to_string(),
            })),
        }
    }
}

#[derive(Clone)]
pub struct CompletionWorkflow {
    gateway: Arc<dyn InventoryGateway>,
    bus: EventBus,
}

impl CompletionWorkflow {
    pub fn new(gateway: Arc<dyn InventoryGateway>, bus: EventBus) -> Self {
        Self { gateway, bus }
    }

    pub async fn check(&self, service_id: u64) -> Result<CompletionCheck, CompletionError> {
        if self.gateway.line_item_count(service_id).await? == 0 {
            return Ok(CompletionCheck::NoItems);
        }
        let lines = self.gateway.check_availability(service_id).await?;
        Ok(CompletionCheck::Items {
            report: AvailabilityReport { service_id, lines },
        })
    }

    /// Completes a service once every inventory line is covered.
    ///
    /// Stock is re-checked here; a report fetched earlier is never trusted.
    /// Worker earnings are recorded afterwards and their failure does not
    /// undo the completion.
    #[instrument(name = "service_complete", skip(self))]
    pub async fn confirm(&self, service_id: u64) -> Result<CompletionOutcome, CompletionError> {
        let service = self
            .gateway
            .find_service(service_id)
            .await?
            .ok_or(CompletionError::NotFound(service_id))?;

        let status = service.status()?;
        if !status.is_open() {
            return Err(CompletionError::InvalidStatus(service_id, status.to_string()));
        }

        let check = self.check(service_id).await?;
        let deducted_items = match &check {
            CompletionCheck::NoItems => Vec::new(),
            CompletionCheck::Items { report } => {
                let shortages = report.shortages();
                if !shortages.is_empty() {
                    warn!(service_id, shortages = shortages.len(), "Completion blocked by stock");
                    return Err(CompletionError::InsufficientStock(shortages));
                }
                report.lines.iter().map(|line| line.item_id).collect()
            }
        };

        if let StockDeduction::Short(lines) = self.gateway.complete_service(service_id).await? {
            let shortages: Vec<Shortage> = lines.iter().map(Shortage::from).collect();
            warn!(service_id, shortages = shortages.len(), "Stock changed before deduction");
            return Err(CompletionError::InsufficientStock(shortages));
        }
        info!(service_id, items = deducted_items.len(), "Service completed");

        if !deducted_items.is_empty() {
            self.bus.publish(BusEvent::InventoryDataChanged {
                service_id: Some(service_id),
                item_ids: deducted_items.clone(),
            });
        }

        let earnings = match service.commission() {
            None => EarningsOutcome::Skipped,
            Some((worker_id, rate, amount)) => {
                match self
                    .gateway
                    .record_earnings(worker_id, service_id, rate, amount)
                    .await
                {
                    Ok(()) => EarningsOutcome::Recorded { worker_id, amount },
                    Err(e) => {
                        error!(error = %e, service_id, worker_id, "Failed to record worker earnings");
                        EarningsOutcome::Failed {
                            message: error_hints::describe(&e.to_string()).to_string(),
                        }
                    }
                }
            }
        };

        Ok(CompletionOutcome {
            service_id,
            deducted_items,
            earnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: u64, required: i64, available: i64) -> AvailabilityLine {
        AvailabilityLine {
            item_id: id,
            item_name: format!("item-{id}"),
            required_quantity: required,
            available_stock: available,
        }
    }

    #[test]
    fn any_shortage_blocks_completion() {
        let report = AvailabilityReport {
            service_id: 1,
            lines: vec![line(1, 2, 10), line(2, 5, 4)],
        };
        assert!(!report.can_complete());
        assert_eq!(report.shortages().len(), 1);
        assert_eq!(report.shortages()[0].shortage, 1);
    }

    #[test]
    fn exact_stock_is_sufficient() {
        let report = AvailabilityReport {
            service_id: 1,
            lines: vec![line(1, 3, 3)],
        };
        assert!(report.can_complete());
        assert!(report.shortages().is_empty());
    }

    #[test]
    fn no_items_always_completable() {
        assert!(CompletionCheck::NoItems.can_complete());
    }
}

use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::completion::{AvailabilityLine, StockDeduction};
use crate::error::{AppError, AppResult};
use crate::model::inventory::TransactionKind;
use crate::model::service::{Service, ServiceStatus};

pub const SERVICE_COLUMNS: &str = "id, customer_id, worker_id, service_name, price, status, \
     commission_rate, scheduled_at, notes, created_by, created_at";

/// Data access used by the service-completion workflow.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    async fn find_service(&self, service_id: u64) -> AppResult<Option<Service>>;
    async fn line_item_count(&self, service_id: u64) -> AppResult<u64>;
    /// Required vs. available quantity per inventory item of the service.
    async fn check_availability(&self, service_id: u64) -> AppResult<Vec<AvailabilityLine>>;
    /// Marks the service completed and deducts its line items from stock.
    /// Writes nothing and returns the short lines if any item no longer
    /// covers its quantity.
    async fn complete_service(&self, service_id: u64) -> AppResult<StockDeduction>;
    async fn record_earnings(
        &self,
        worker_id: u64,
        service_id: u64,
        commission_rate: f64,
        amount: f64,
    ) -> AppResult<()>;
}

pub struct MySqlInventoryGateway {
    pool: MySqlPool,
}

impl MySqlInventoryGateway {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryGateway for MySqlInventoryGateway {
    async fn find_service(&self, service_id: u64) -> AppResult<Option<Service>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?");
        let service = sqlx::query_as::<_, Service>(&sql)
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(service)
    }

    async fn line_item_count(&self, service_id: u64) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_products WHERE service_id = ?",
        )
        .bind(service_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn check_availability(&self, service_id: u64) -> AppResult<Vec<AvailabilityLine>> {
        let lines = sqlx::query_as::<_, AvailabilityLine>(
            r#"
            SELECT
                i.id AS item_id,
                i.name AS item_name,
                CAST(SUM(sp.quantity) AS SIGNED) AS required_quantity,
                CAST(i.current_stock AS SIGNED) AS available_stock
            FROM service_products sp
            JOIN inventory_items i ON i.id = sp.item_id
            WHERE sp.service_id = ?
            GROUP BY i.id, i.name, i.current_stock
            ORDER BY i.name
            "#,
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn complete_service(&self, service_id: u64) -> AppResult<StockDeduction> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE services SET status = ? WHERE id = ? AND status IN (?, ?)",
        )
        .bind(ServiceStatus::Completed.as_ref())
        .bind(service_id)
        .bind(ServiceStatus::Pending.as_ref())
        .bind(ServiceStatus::InProgress.as_ref())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Service {service_id} is already completed or cancelled"
            )));
        }

        let items = sqlx::query_as::<_, (u64, String, i64)>(
            r#"
            SELECT i.id, i.name, CAST(SUM(sp.quantity) AS SIGNED)
            FROM service_products sp
            JOIN inventory_items i ON i.id = sp.item_id
            WHERE sp.service_id = ?
            GROUP BY i.id, i.name
            "#,
        )
        .bind(service_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut short = Vec::new();
        for (item_id, item_name, quantity) in items {
            // stock never goes below zero, even with concurrent completions
            let deducted = sqlx::query(
                "UPDATE inventory_items SET current_stock = current_stock - ? \
                 WHERE id = ? AND current_stock >= ?",
            )
            .bind(quantity)
            .bind(item_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if deducted.rows_affected() == 0 {
                let available = sqlx::query_scalar::<_, i64>(
                    "SELECT CAST(current_stock AS SIGNED) FROM inventory_items WHERE id = ?",
                )
                .bind(item_id)
                .fetch_one(&mut *tx)
                .await?;
                short.push(AvailabilityLine {
                    item_id,
                    item_name,
                    required_quantity: quantity,
                    available_stock: available,
                });
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO inventory_transactions (item_id, quantity, kind, service_id, note)
                VALUES (?, ?, ?, ?, 'service completion')
                "#,
            )
            .bind(item_id)
            .bind(-quantity)
            .bind(TransactionKind::Out.as_ref())
            .bind(service_id)
            .execute(&mut *tx)
            .await?;
        }

        if !short.is_empty() {
            tx.rollback().await?;
            return Ok(StockDeduction::Short(short));
        }

        tx.commit().await?;
        Ok(StockDeduction::Completed)
    }

    async fn record_earnings(
        &self,
        worker_id: u64,
        service_id: u64,
        commission_rate: f64,
        amount: f64,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO worker_earnings (worker_id, service_id, amount, commission_rate)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(worker_id)
        .bind(service_id)
        .bind(amount)
        .bind(commission_rate)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE workers SET total_earnings = total_earnings + ? WHERE id = ?")
            .bind(amount)
            .bind(worker_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

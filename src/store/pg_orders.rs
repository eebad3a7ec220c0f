use crate::domain::row::ValidatedOrder;
use crate::domain::writer::OrderWriter;
use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Bulk-inserts validated orders inside a single transaction. A unique
/// constraint on `order_number` is the backstop if a concurrent batch
/// accepted the same order number between snapshot capture and this insert;
/// the resulting constraint violation fails the whole insert, which is the
/// desired "no partial commit" behavior.
pub struct PgOrderWriter {
    pool: PgPool,
}

impl PgOrderWriter {
    pub fn new(pool: PgPool) -> PgOrderWriter {
        PgOrderWriter { pool }
    }
}

#[async_trait]
impl OrderWriter for PgOrderWriter {
    async fn insert_all(&self, orders: &[ValidatedOrder]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("starting order insert transaction")?;

        for order in orders {
            sqlx::query(
                "INSERT INTO orders (id, order_number, client_id, zone_id, delivery_date, status, requires_refrigeration) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::new_v4())
            .bind(&order.order_number)
            .bind(&order.client_id)
            .bind(&order.zone_id)
            .bind(order.delivery_date)
            .bind(order.status.as_str())
            .bind(order.requires_refrigeration)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting order {}", order.order_number))?;
        }

        tx.commit().await.context("committing order insert transaction")?;
        Ok(())
    }
}

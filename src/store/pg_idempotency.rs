use crate::domain::idempotency::{BatchLoad, IdempotencyStore, ReserveError};
use crate::domain::row::RowError;
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Persists `batch_loads`/`batch_load_errors`, enforcing the
/// `(idempotency_key, file_hash)` uniqueness at the database layer via a
/// unique index rather than an application-level check-then-act.
pub struct PgIdempotencyStore {
    pool: PgPool,
}

impl PgIdempotencyStore {
    pub fn new(pool: PgPool) -> PgIdempotencyStore {
        PgIdempotencyStore { pool }
    }

    fn row_to_batch_load(row: &sqlx::postgres::PgRow) -> anyhow::Result<BatchLoad> {
        let status: String = row.try_get("status")?;
        Ok(BatchLoad {
            id: row.try_get("id")?,
            idempotency_key: row.try_get("idempotency_key")?,
            file_hash: row.try_get("file_hash")?,
            status: status.parse()?,
            total_processed: row.try_get("total_processed")?,
            success_count: row.try_get("success_count")?,
            error_count: row.try_get("error_count")?,
        })
    }
}

#[async_trait]
impl IdempotencyStore for PgIdempotencyStore {
    async fn lookup(&self, key: &str, digest: &str) -> anyhow::Result<Option<BatchLoad>> {
        let row = sqlx::query(
            "SELECT id, idempotency_key, file_hash, status, total_processed, success_count, error_count \
             FROM batch_loads WHERE idempotency_key = $1 AND file_hash = $2",
        )
        .bind(key)
        .bind(digest)
        .fetch_optional(&self.pool)
        .await
        .context("looking up batch load")?;

        row.as_ref().map(Self::row_to_batch_load).transpose()
    }

    async fn reserve(&self, key: &str, digest: &str) -> Result<BatchLoad, ReserveError> {
        let id = Uuid::new_v4();
        let result = sqlx::query(
            "INSERT INTO batch_loads \
                (id, idempotency_key, file_hash, status, total_processed, success_count, error_count) \
             VALUES ($1, $2, $3, 'PROCESSING', 0, 0, 0) \
             RETURNING id, idempotency_key, file_hash, status, total_processed, success_count, error_count",
        )
        .bind(id)
        .bind(key)
        .bind(digest)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Self::row_to_batch_load(&row).map_err(ReserveError::Internal),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(ReserveError::AlreadyReserved)
            }
            Err(e) => Err(ReserveError::Internal(
                anyhow::Error::new(e).context("reserving batch load"),
            )),
        }
    }

    async fn finalize(
        &self,
        id: Uuid,
        total_processed: i32,
        success_count: i32,
        errors: &[RowError],
    ) -> anyhow::Result<BatchLoad> {
        let mut tx = self.pool.begin().await.context("starting finalize transaction")?;

        let error_count = errors.len() as i32;
        let row = sqlx::query(
            "UPDATE batch_loads \
             SET status = 'COMPLETED', total_processed = $2, success_count = $3, error_count = $4, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, idempotency_key, file_hash, status, total_processed, success_count, error_count",
        )
        .bind(id)
        .bind(total_processed)
        .bind(success_count)
        .bind(error_count)
        .fetch_one(&mut *tx)
        .await
        .context("updating batch load on finalize")?;

        for error in errors {
            sqlx::query(
                "INSERT INTO batch_load_errors (id, batch_load_id, line_number, code, message) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(error.line_number as i32)
            .bind(error.code.as_str())
            .bind(&error.message)
            .execute(&mut *tx)
            .await
            .context("inserting batch load error")?;
        }

        tx.commit().await.context("committing finalize transaction")?;
        Self::row_to_batch_load(&row)
    }

    async fn fail(&self, id: Uuid) -> anyhow::Result<BatchLoad> {
        let row = sqlx::query(
            "UPDATE batch_loads SET status = 'FAILED', updated_at = now() WHERE id = $1 \
             RETURNING id, idempotency_key, file_hash, status, total_processed, success_count, error_count",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("marking batch load failed")?;

        Self::row_to_batch_load(&row)
    }
}


use crate::domain::snapshot::{CatalogSnapshot, CatalogSnapshotReader};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

/// Loads a point-in-time snapshot of active clients, zones, and previously
/// accepted order numbers. Issued as three plain reads outside the write
/// transaction, per the shared-resource policy's allowance to minimise lock
/// duration.
pub struct PgCatalogSnapshotReader {
    pool: PgPool,
}

impl PgCatalogSnapshotReader {
    pub fn new(pool: PgPool) -> PgCatalogSnapshotReader {
        PgCatalogSnapshotReader { pool }
    }
}

#[async_trait]
impl CatalogSnapshotReader for PgCatalogSnapshotReader {
    async fn load_snapshot(&self) -> anyhow::Result<CatalogSnapshot> {
        let active_clients: HashSet<String> = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM clients WHERE active",
        )
        .fetch_all(&self.pool)
        .await
        .context("loading active clients")?
        .into_iter()
        .map(|(id,)| id)
        .collect();

        let zones: HashMap<String, bool> = sqlx::query_as::<_, (String, bool)>(
            "SELECT id, refrigeration_capable FROM zones",
        )
        .fetch_all(&self.pool)
        .await
        .context("loading zones")?
        .into_iter()
        .collect();

        let existing_order_numbers: HashSet<String> = sqlx::query_as::<_, (String,)>(
            "SELECT order_number FROM orders",
        )
        .fetch_all(&self.pool)
        .await
        .context("loading existing order numbers")?
        .into_iter()
        .map(|(order_number,)| order_number)
        .collect();

        Ok(CatalogSnapshot {
            active_clients,
            zones,
            existing_order_numbers,
        })
    }
}

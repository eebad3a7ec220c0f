//! In-memory fakes of the domain collaborator traits, for unit and
//! integration tests. No test here talks to a real database.

use crate::domain::clock::BusinessClock;
use crate::domain::idempotency::{BatchLoad, BatchStatus, IdempotencyStore, ReserveError};
use crate::domain::row::{RowError, ValidatedOrder};
use crate::domain::snapshot::{CatalogSnapshot, CatalogSnapshotReader};
use crate::domain::writer::OrderWriter;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;
use uuid::Uuid;

/// A `BusinessClock` that always reports the same date, so validator tests
/// don't drift with wall-clock time.
pub struct FixedClock {
    today: NaiveDate,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> FixedClock {
        FixedClock { today }
    }
}

impl BusinessClock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }
}

/// Serves a fixed snapshot, or an error on the next call if `fail_next` was
/// invoked, for exercising the orchestrator's infrastructural-failure path.
pub struct InMemoryCatalog {
    snapshot: CatalogSnapshot,
    fail_next: Mutex<bool>,
}

impl InMemoryCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> InMemoryCatalog {
        InMemoryCatalog {
            snapshot,
            fail_next: Mutex::new(false),
        }
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

#[async_trait]
impl CatalogSnapshotReader for InMemoryCatalog {
    async fn load_snapshot(&self) -> anyhow::Result<CatalogSnapshot> {
        let mut fail_next = self.fail_next.lock().unwrap();
        if *fail_next {
            *fail_next = false;
            return Err(anyhow::anyhow!("simulated catalog outage"));
        }
        Ok(self.snapshot.clone())
    }
}

#[derive(Default)]
pub struct InMemoryOrderWriter {
    stored: Mutex<Vec<ValidatedOrder>>,
}

impl InMemoryOrderWriter {
    pub fn stored(&self) -> Vec<ValidatedOrder> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderWriter for InMemoryOrderWriter {
    async fn insert_all(&self, orders: &[ValidatedOrder]) -> anyhow::Result<()> {
        self.stored.lock().unwrap().extend_from_slice(orders);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    batches: Mutex<Vec<BatchLoad>>,
}

impl InMemoryIdempotencyStore {
    pub fn seed(&self, batch: BatchLoad) {
        self.batches.lock().unwrap().push(batch);
    }

    pub fn reservation_count(&self, key: &str) -> usize {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.idempotency_key == key)
            .count()
    }

    pub fn status_of(&self, key: &str) -> Option<BatchStatus> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.idempotency_key == key)
            .map(|b| b.status)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn lookup(&self, key: &str, digest: &str) -> anyhow::Result<Option<BatchLoad>> {
        Ok(self
            .batches
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.idempotency_key == key && b.file_hash == digest)
            .cloned())
    }

    async fn reserve(&self, key: &str, digest: &str) -> Result<BatchLoad, ReserveError> {
        let mut batches = self.batches.lock().unwrap();
        if batches
            .iter()
            .any(|b| b.idempotency_key == key && b.file_hash == digest)
        {
            return Err(ReserveError::AlreadyReserved);
        }
        let batch = BatchLoad {
            id: Uuid::new_v4(),
            idempotency_key: key.to_owned(),
            file_hash: digest.to_owned(),
            status: BatchStatus::Processing,
            total_processed: 0,
            success_count: 0,
            error_count: 0,
        };
        batches.push(batch.clone());
        Ok(batch)
    }

    async fn finalize(
        &self,
        id: Uuid,
        total_processed: i32,
        success_count: i32,
        errors: &[RowError],
    ) -> anyhow::Result<BatchLoad> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| anyhow::anyhow!("no such batch load: {id}"))?;
        batch.status = BatchStatus::Completed;
        batch.total_processed = total_processed;
        batch.success_count = success_count;
        batch.error_count = errors.len() as i32;
        Ok(batch.clone())
    }

    async fn fail(&self, id: Uuid) -> anyhow::Result<BatchLoad> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| anyhow::anyhow!("no such batch load: {id}"))?;
        batch.status = BatchStatus::Failed;
        Ok(batch.clone())
    }
}

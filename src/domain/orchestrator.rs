use crate::domain::clock::BusinessClock;
use crate::domain::idempotency::{BatchStatus, IdempotencyStore, ReserveError};
use crate::domain::parser;
use crate::domain::row::{RowError, RowErrorCode, ValidatedOrder};
use crate::domain::snapshot::CatalogSnapshotReader;
use crate::domain::validator::validate_row;
use crate::domain::writer::OrderWriter;
use crate::{digest_bytes, IngestError};
use std::collections::HashMap;
use uuid::Uuid;

/// The per-row diagnostic report returned to the HTTP surface.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub batch_load_id: Uuid,
    pub total_processed: usize,
    pub stored_count: usize,
    pub error_count: usize,
    pub errors_by_code: HashMap<RowErrorCode, usize>,
    pub error_details: Vec<RowError>,
}

/// Composes the Record Parser, Content Digest, Catalog Snapshot Loader, Row
/// Validator, Order Writer and Idempotency Store inside one logical
/// transactional boundary. This is the orchestrator described in `spec.md`
/// §4.G; the state machine it drives is:
///
/// ```text
///            reserve
///   (∅) ─────────────▶ PROCESSING
///                       │   │
///                 finalize  fail
///                       ▼   ▼
///                  COMPLETED FAILED
/// ```
pub struct Orchestrator<'a> {
    idempotency: &'a dyn IdempotencyStore,
    catalog: &'a dyn CatalogSnapshotReader,
    writer: &'a dyn OrderWriter,
    clock: &'a dyn BusinessClock,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        idempotency: &'a dyn IdempotencyStore,
        catalog: &'a dyn CatalogSnapshotReader,
        writer: &'a dyn OrderWriter,
        clock: &'a dyn BusinessClock,
    ) -> Self {
        Orchestrator {
            idempotency,
            catalog,
            writer,
            clock,
        }
    }

    /// Runs the full pipeline for one upload, identified by an
    /// operator-supplied `idempotency_key` and the raw bytes of the
    /// uploaded file. `idempotency_key` must already be known non-blank;
    /// that is an HTTP-surface precondition (`FIELD_REQUIRED`), not a
    /// concern of the core.
    pub async fn ingest(
        &self,
        idempotency_key: &str,
        bytes: &[u8],
    ) -> Result<BatchSummary, IngestError> {
        let digest = digest_bytes(bytes);

        // Structural failures abort the whole batch before any reservation
        // is attempted.
        let rows = parser::parse(bytes)?;

        // Step 1: pre-reservation lookup.
        if let Some(existing) = self
            .idempotency
            .lookup(idempotency_key, &digest)
            .await
            .map_err(IngestError::Internal)?
        {
            match existing.status {
                BatchStatus::Completed => return Err(IngestError::AlreadyProcessed),
                BatchStatus::Processing => return Err(IngestError::BeingProcessed),
                // A previously failed run does not block a fresh attempt.
                BatchStatus::Failed => {}
            }
        }

        // Step 2: reserve.
        let reservation = match self.idempotency.reserve(idempotency_key, &digest).await {
            Ok(batch_load) => batch_load,
            Err(ReserveError::AlreadyReserved) => return Err(IngestError::AlreadyProcessed),
            Err(ReserveError::Internal(e)) => return Err(IngestError::Internal(e)),
        };
        let batch_load_id = reservation.id;

        match self.run_reserved(batch_load_id, rows).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                // Any unexpected error in steps 3-5 invalidates the whole
                // batch; the reservation is not left dangling in
                // PROCESSING.
                if let Err(fail_err) = self.idempotency.fail(batch_load_id).await {
                    return Err(IngestError::Internal(anyhow::anyhow!(
                        "batch {batch_load_id} failed ({e:#}); marking it FAILED also failed: {fail_err:#}"
                    )));
                }
                Err(IngestError::Internal(e))
            }
        }
    }

    /// Steps 3-6 of the pipeline, run against an already-reserved batch.
    /// Returned errors are infrastructural and cause the caller to mark the
    /// reservation `FAILED`.
    async fn run_reserved(
        &self,
        batch_load_id: Uuid,
        rows: Vec<crate::domain::row::Row>,
    ) -> anyhow::Result<BatchSummary> {
        // Step 3: snapshot.
        let snapshot = self.catalog.load_snapshot().await?;

        // Step 4: validate. Error output order matches input row order.
        let mut seen = snapshot.existing_order_numbers.clone();
        let today = self.clock.today();
        let mut valid_orders: Vec<ValidatedOrder> = Vec::new();
        let mut errors: Vec<RowError> = Vec::new();
        for row in &rows {
            match validate_row(row, &snapshot, &mut seen, today) {
                Ok(order) => valid_orders.push(order),
                Err(row_error) => errors.push(row_error),
            }
        }

        // Step 5: insert.
        if !valid_orders.is_empty() {
            self.writer.insert_all(&valid_orders).await?;
        }

        // Step 6: finalize.
        let finalized = self
            .idempotency
            .finalize(
                batch_load_id,
                rows.len() as i32,
                valid_orders.len() as i32,
                &errors,
            )
            .await?;

        let mut errors_by_code: HashMap<RowErrorCode, usize> = HashMap::new();
        for e in &errors {
            *errors_by_code.entry(e.code).or_insert(0) += 1;
        }

        Ok(BatchSummary {
            batch_load_id: finalized.id,
            total_processed: rows.len(),
            stored_count: valid_orders.len(),
            error_count: errors.len(),
            errors_by_code,
            error_details: errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::BusinessClock;
    use crate::domain::idempotency::BatchLoad;
    use crate::domain::snapshot::CatalogSnapshot;
    use crate::test_utils::{FixedClock, InMemoryCatalog, InMemoryIdempotencyStore, InMemoryOrderWriter};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::{HashMap as StdHashMap, HashSet};

    fn header() -> &'static str {
        "orderNumber,clientId,deliveryDate,status,zoneId,requiresRefrigeration"
    }

    fn base_snapshot() -> CatalogSnapshot {
        let mut zones = StdHashMap::new();
        zones.insert("ZONA1".to_owned(), true);
        zones.insert("ZONA2".to_owned(), false);
        CatalogSnapshot {
            active_clients: ["CLI-1"].into_iter().map(String::from).collect(),
            zones,
            existing_order_numbers: HashSet::new(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 30).unwrap()
    }

    struct Fixture {
        idempotency: InMemoryIdempotencyStore,
        catalog: InMemoryCatalog,
        writer: InMemoryOrderWriter,
        clock: FixedClock,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                idempotency: InMemoryIdempotencyStore::default(),
                catalog: InMemoryCatalog::new(base_snapshot()),
                writer: InMemoryOrderWriter::default(),
                clock: FixedClock::new(today()),
            }
        }

        fn orchestrator(&self) -> Orchestrator<'_> {
            Orchestrator::new(&self.idempotency, &self.catalog, &self.writer, &self.clock)
        }
    }

    #[tokio::test]
    async fn happy_path_stores_one_order() {
        let fx = Fixture::new();
        let body = format!("{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n", header());
        let summary = fx
            .orchestrator()
            .ingest("batch-A", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(summary.total_processed, 1);
        assert_eq!(summary.stored_count, 1);
        assert_eq!(summary.error_count, 0);
        assert_eq!(fx.writer.stored().len(), 1);
    }

    #[tokio::test]
    async fn replay_of_completed_batch_is_rejected() {
        let fx = Fixture::new();
        let body = format!("{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n", header());
        fx.orchestrator().ingest("batch-A", body.as_bytes()).await.unwrap();

        let result = fx.orchestrator().ingest("batch-A", body.as_bytes()).await;
        assert!(matches!(result, Err(IngestError::AlreadyProcessed)));
        assert_eq!(fx.idempotency.reservation_count("batch-A"), 1);
    }

    #[tokio::test]
    async fn mixed_outcome_batch() {
        let fx = Fixture::new();
        let body = format!(
            "{}\nP010,CLI-1,2099-01-01,PENDING,ZONA1,true\nP011,CLI-UNKNOWN,2099-01-01,PENDING,ZONA1,false\nP012,CLI-1,2020-01-01,PENDING,ZONA1,false\n",
            header()
        );
        let summary = fx
            .orchestrator()
            .ingest("batch-B", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(summary.stored_count, 1);
        assert_eq!(summary.error_count, 2);
        assert_eq!(
            *summary.errors_by_code.get(&RowErrorCode::ClientNotFound).unwrap(),
            1
        );
        assert_eq!(
            *summary
                .errors_by_code
                .get(&RowErrorCode::DeliveryDatePast)
                .unwrap(),
            1
        );
        assert_eq!(fx.writer.stored()[0].order_number, "P010");
    }

    #[tokio::test]
    async fn all_rows_fail_still_completes_the_batch() {
        let fx = Fixture::new();
        let body = format!(
            "{}\nP001,CLI-1,2099-01-01,PENDING,ZONA-X,false\nP002,CLI-1,2099-01-01,PENDING,ZONA-Y,false\n",
            header()
        );
        let summary = fx
            .orchestrator()
            .ingest("batch-C", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(summary.stored_count, 0);
        assert_eq!(summary.error_count, 2);
        assert_eq!(
            fx.idempotency.status_of("batch-C"),
            Some(BatchStatus::Completed)
        );
    }

    #[tokio::test]
    async fn intra_batch_duplicate_order_number() {
        let fx = Fixture::new();
        let body = format!(
            "{}\nP020,CLI-1,2099-01-01,PENDING,ZONA1,false\nP020,CLI-1,2099-01-01,PENDING,ZONA1,false\n",
            header()
        );
        let summary = fx
            .orchestrator()
            .ingest("batch-D", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(summary.stored_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(
            summary.error_details[0].code,
            RowErrorCode::OrderDuplicate
        );
    }

    #[tokio::test]
    async fn structural_failure_does_not_reserve() {
        let fx = Fixture::new();
        let result = fx
            .orchestrator()
            .ingest("batch-E", b"orderNumber,clientId,deliveryDate,status,zoneId,requiresRefrigeration\n")
            .await;
        assert!(matches!(result, Err(IngestError::FormatInvalid(_))));
        assert_eq!(fx.idempotency.reservation_count("batch-E"), 0);
    }

    #[tokio::test]
    async fn being_processed_batch_is_rejected() {
        let fx = Fixture::new();
        let body = format!("{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n", header());
        let digest = crate::digest_bytes(body.as_bytes());
        fx.idempotency
            .seed(BatchLoad {
                id: Uuid::new_v4(),
                idempotency_key: "batch-F".to_owned(),
                file_hash: digest,
                status: BatchStatus::Processing,
                total_processed: 0,
                success_count: 0,
                error_count: 0,
            });
        let result = fx.orchestrator().ingest("batch-F", body.as_bytes()).await;
        assert!(matches!(result, Err(IngestError::BeingProcessed)));
    }

    #[tokio::test]
    async fn infrastructural_error_marks_batch_failed() {
        let fx = Fixture::new();
        fx.catalog.fail_next();
        let body = format!("{}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n", header());
        let result = fx.orchestrator().ingest("batch-G", body.as_bytes()).await;
        assert!(matches!(result, Err(IngestError::Internal(_))));
        assert_eq!(
            fx.idempotency.status_of("batch-G"),
            Some(BatchStatus::Failed)
        );
    }
}

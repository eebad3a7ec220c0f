//! End-to-end scenarios against in-memory fakes of the catalog, idempotency
//! and order stores, mirroring the literal scenarios enumerated for the
//! batch ingestion core.

use chrono::NaiveDate;
use order_batch_ingestor::domain::{CatalogSnapshot, Orchestrator};
use order_batch_ingestor::test_utils::{
    FixedClock, InMemoryCatalog, InMemoryIdempotencyStore, InMemoryOrderWriter,
};
use order_batch_ingestor::IngestError;
use std::collections::HashMap;

const HEADER: &str = "orderNumber,clientId,deliveryDate,status,zoneId,requiresRefrigeration";

fn snapshot() -> CatalogSnapshot {
    let mut zones = HashMap::new();
    zones.insert("ZONA1".to_owned(), true);
    zones.insert("ZONA2".to_owned(), false);
    CatalogSnapshot {
        active_clients: ["CLI-1"].into_iter().map(String::from).collect(),
        zones,
        existing_order_numbers: Default::default(),
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 30).unwrap()
}

struct Harness {
    idempotency: InMemoryIdempotencyStore,
    catalog: InMemoryCatalog,
    writer: InMemoryOrderWriter,
    clock: FixedClock,
}

impl Harness {
    fn new() -> Self {
        Harness {
            idempotency: InMemoryIdempotencyStore::default(),
            catalog: InMemoryCatalog::new(snapshot()),
            writer: InMemoryOrderWriter::default(),
            clock: FixedClock::new(today()),
        }
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(&self.idempotency, &self.catalog, &self.writer, &self.clock)
    }
}

#[tokio::test]
async fn scenario_1_happy_path() {
    let h = Harness::new();
    let body = format!("{HEADER}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n");

    let summary = h.orchestrator().ingest("batch-A", body.as_bytes()).await.unwrap();

    assert_eq!(summary.total_processed, 1);
    assert_eq!(summary.stored_count, 1);
    assert_eq!(summary.error_count, 0);
    assert!(summary.error_details.is_empty());

    let stored = h.writer.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].order_number, "P001");
}

#[tokio::test]
async fn scenario_2_replay() {
    let h = Harness::new();
    let body = format!("{HEADER}\nP001,CLI-1,2099-01-01,PENDING,ZONA1,true\n");

    h.orchestrator().ingest("batch-A", body.as_bytes()).await.unwrap();
    let replay = h.orchestrator().ingest("batch-A", body.as_bytes()).await;

    assert!(matches!(replay, Err(IngestError::AlreadyProcessed)));
    assert_eq!(h.idempotency.reservation_count("batch-A"), 1);
}

#[tokio::test]
async fn scenario_3_mixed_outcome() {
    let h = Harness::new();
    let body = format!(
        "{HEADER}\n\
         P010,CLI-1,2099-01-01,PENDING,ZONA1,true\n\
         P011,CLI-UNKNOWN,2099-01-01,PENDING,ZONA1,false\n\
         P012,CLI-1,2020-01-01,PENDING,ZONA1,false\n"
    );

    let summary = h.orchestrator().ingest("batch-C", body.as_bytes()).await.unwrap();

    assert_eq!(summary.stored_count, 1);
    assert_eq!(summary.error_count, 2);

    let stored = h.writer.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].order_number, "P010");
}

#[tokio::test]
async fn header_only_upload_is_a_structural_failure_with_no_reservation() {
    let h = Harness::new();
    let body = format!("{HEADER}\n");

    let result = h.orchestrator().ingest("batch-D", body.as_bytes()).await;

    assert!(matches!(result, Err(IngestError::FormatInvalid(_))));
    assert_eq!(h.idempotency.reservation_count("batch-D"), 0);
}

#[tokio::test]
async fn row_with_missing_trailing_field_is_padded_and_validated() {
    let h = Harness::new();
    let body = format!("{HEADER}\nP020,CLI-1,2099-01-01,PENDING,ZONA1\n");

    let summary = h.orchestrator().ingest("batch-E", body.as_bytes()).await.unwrap();

    assert_eq!(summary.stored_count, 1);
    assert_eq!(summary.error_count, 0);
}

#[tokio::test]
async fn invariant_success_and_error_counts_sum_to_total() {
    let h = Harness::new();
    let body = format!(
        "{HEADER}\n\
         P030,CLI-1,2099-01-01,PENDING,ZONA1,false\n\
         P031,CLI-NOPE,2099-01-01,PENDING,ZONA1,false\n\
         P032,CLI-1,ZONA-NOPE,PENDING,ZONA-NOPE,false\n"
    );

    let summary = h.orchestrator().ingest("batch-F", body.as_bytes()).await.unwrap();

    assert_eq!(summary.total_processed, summary.stored_count + summary.error_count);
    assert_eq!(summary.error_count, summary.error_details.len());
    assert_eq!(
        summary.errors_by_code.values().sum::<usize>(),
        summary.error_count
    );
}

#[tokio::test]
async fn delivery_date_boundary_today_accepted_yesterday_rejected() {
    let h = Harness::new();
    let yesterday = today() - chrono::Duration::days(1);
    let body = format!(
        "{HEADER}\n\
         P040,CLI-1,{today},PENDING,ZONA1,false\n\
         P041,CLI-1,{yesterday},PENDING,ZONA1,false\n",
        today = today().format("%Y-%m-%d"),
        yesterday = yesterday.format("%Y-%m-%d"),
    );

    let summary = h.orchestrator().ingest("batch-G", body.as_bytes()).await.unwrap();

    assert_eq!(summary.stored_count, 1);
    assert_eq!(summary.error_count, 1);
    assert_eq!(h.writer.stored()[0].order_number, "P040");
}

use crate::domain::row::RowError;
use async_trait::async_trait;
use uuid::Uuid;

/// Lifecycle of a `BatchLoad`. `Processing` is the only non-terminal state;
/// there is no transition back into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "PROCESSING",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(BatchStatus::Processing),
            "COMPLETED" => Ok(BatchStatus::Completed),
            "FAILED" => Ok(BatchStatus::Failed),
            other => Err(anyhow::anyhow!("unrecognized batch load status: {other}")),
        }
    }
}

/// The persisted aggregate tracking one batch upload. `BatchLoad` owns its
/// `RowError` children exclusively; `ValidatedOrder` rows are not owned by
/// it and live in a separate store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLoad {
    pub id: Uuid,
    pub idempotency_key: String,
    pub file_hash: String,
    pub status: BatchStatus,
    pub total_processed: i32,
    pub success_count: i32,
    pub error_count: i32,
}

/// Raised by `IdempotencyStore::reserve` when the unique `(key, digest)`
/// constraint is violated by a concurrent reservation.
#[derive(Debug, thiserror::Error)]
pub enum ReserveError {
    #[error("a batch load already exists for this idempotency key and file digest")]
    AlreadyReserved,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Persists and looks up batch-load records keyed by `(idempotency_key,
/// file_hash)`, enforcing uniqueness atomically at the store layer.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn lookup(&self, key: &str, digest: &str) -> anyhow::Result<Option<BatchLoad>>;

    /// Atomically creates a `PROCESSING` row. On a unique-constraint
    /// violation, returns `ReserveError::AlreadyReserved` without side
    /// effects.
    async fn reserve(&self, key: &str, digest: &str) -> Result<BatchLoad, ReserveError>;

    /// Updates counters, attaches error children, and transitions the batch
    /// to `Completed`. Idempotent under retry only if called again with the
    /// same arguments.
    async fn finalize(
        &self,
        id: Uuid,
        total_processed: i32,
        success_count: i32,
        errors: &[RowError],
    ) -> anyhow::Result<BatchLoad>;

    /// Transitions the batch to `Failed` without touching counters or
    /// children.
    async fn fail(&self, id: Uuid) -> anyhow::Result<BatchLoad>;
}

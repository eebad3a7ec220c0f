use crate::domain::row::ValidatedOrder;
use async_trait::async_trait;

/// Bulk-inserts validated order records. A single call covers the whole
/// batch; a unique constraint on `order_number` at the store layer is the
/// backstop against a concurrent batch having accepted the same order
/// number between snapshot capture and this insert.
#[async_trait]
pub trait OrderWriter: Send + Sync {
    async fn insert_all(&self, orders: &[ValidatedOrder]) -> anyhow::Result<()>;
}

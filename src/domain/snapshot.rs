use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// An immutable, point-in-time view of referential catalog data, captured
/// once per batch and never refreshed mid-batch. The final bulk insert
/// still relies on a database-level unique constraint on order number to
/// catch any race against a concurrent batch.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub active_clients: HashSet<String>,
    /// Zone ID -> refrigeration-capable.
    pub zones: HashMap<String, bool>,
    pub existing_order_numbers: HashSet<String>,
}

/// Narrow interface over the catalog store. Deliberately excludes anything
/// about how clients/zones are authored or migrated — the core only ever
/// reads a snapshot.
#[async_trait]
pub trait CatalogSnapshotReader: Send + Sync {
    async fn load_snapshot(&self) -> anyhow::Result<CatalogSnapshot>;
}

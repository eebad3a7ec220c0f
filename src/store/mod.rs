//! Postgres-backed implementations of the three domain collaborator traits.
//! Each is a thin adapter: the query shapes live here, the decisions about
//! what to do with the results live in `domain`.

mod pg_catalog;
mod pg_idempotency;
mod pg_orders;

pub use pg_catalog::PgCatalogSnapshotReader;
pub use pg_idempotency::PgIdempotencyStore;
pub use pg_orders::PgOrderWriter;

use backoff::future::retry;
use backoff::ExponentialBackoff;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connects to Postgres, retrying with exponential backoff while the
/// database is still coming up (e.g. during a coordinated deploy). Gives up
/// after 60 seconds and returns the last connection error.
pub async fn connect_with_retry(database_url: &str, logger: &slog::Logger) -> anyhow::Result<PgPool> {
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(1),
        max_interval: Duration::from_secs(10),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(60)),
        ..Default::default()
    };

    retry(backoff, || async {
        PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| {
                slog::info!(logger, "database not yet reachable, retrying"; "error" => %e);
                backoff::Error::Transient(e)
            })
    })
    .await
    .map_err(|e| anyhow::Error::new(e).context("connecting to database"))
}

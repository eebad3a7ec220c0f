use anyhow::{Context, Result};
use clap::{App as ClapApp, Arg};
use order_batch_ingestor::auth::JwtAuthenticator;
use order_batch_ingestor::config::AppConfig;
use order_batch_ingestor::domain::clock::LimaClock;
use order_batch_ingestor::http::{self, App};
use order_batch_ingestor::logging::{setup_logging, LoggingConfiguration};
use order_batch_ingestor::metrics::{start_metrics_scrape_endpoint, IngestionMetricsCollector};
use order_batch_ingestor::store::{
    connect_with_retry, PgCatalogSnapshotReader, PgIdempotencyStore, PgOrderWriter,
};
use std::sync::Arc;

fn main() -> Result<()> {
    let matches = ClapApp::new("order-batch-ingestor")
        .about("HTTP service for batch order ingestion")
        .arg(
            Arg::with_name("listen-address")
                .long("listen-address")
                .takes_value(true)
                .default_value("0.0.0.0:8080"),
        )
        .arg(
            Arg::with_name("metrics-port")
                .long("metrics-port")
                .takes_value(true)
                .default_value("8081"),
        )
        .arg(
            Arg::with_name("database-url")
                .long("database-url")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("jwt-verification-key")
                .long("jwt-verification-key")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("business-timezone")
                .long("business-timezone")
                .takes_value(true)
                .default_value("America/Lima"),
        )
        .arg(
            Arg::with_name("batch-size-hint")
                .long("batch-size-hint")
                .takes_value(true)
                .default_value("5000"),
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .takes_value(true)
                .default_value("info"),
        )
        .arg(Arg::with_name("force-json-log").long("force-json-log"))
        .get_matches();

    let config = AppConfig::from_matches(&matches)?;

    let log_level = matches.value_of("log-level").unwrap_or("info").to_owned();
    let (logger, _guard) = setup_logging(&LoggingConfiguration {
        force_json_output: matches.is_present("force-json-log"),
        version_string: env!("CARGO_PKG_VERSION"),
        log_level: &log_level,
    })
    .context("failed to set up logging")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to create Tokio runtime")?;
    runtime.block_on(run(config, logger))
}

async fn run(config: AppConfig, logger: slog::Logger) -> Result<()> {
    IngestionMetricsCollector::new().context("registering metrics")?;
    let _metrics_runtime =
        start_metrics_scrape_endpoint(config.metrics_port).context("starting metrics endpoint")?;

    let pool = connect_with_retry(&config.database_url, &logger)
        .await
        .context("connecting to database")?;

    let app = Arc::new(App {
        idempotency: Arc::new(PgIdempotencyStore::new(pool.clone())),
        catalog: Arc::new(PgCatalogSnapshotReader::new(pool.clone())),
        writer: Arc::new(PgOrderWriter::new(pool)),
        clock: Arc::new(LimaClock::new(config.business_timezone)),
        authenticator: Arc::new(JwtAuthenticator::new(&config.jwt_verification_key)),
    });

    slog_scope::info!("starting ingestion server"; "listen_address" => %config.listen_address);

    warp::serve(http::routes(app)).run(config.listen_address).await;

    Ok(())
}

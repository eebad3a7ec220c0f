use anyhow::{Context, Result};
use http::Response;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::runtime::Runtime;
use warp::Filter;

/// Starts listening on an HTTP endpoint so that Prometheus can scrape metrics
/// from this instance. On success, returns a Runtime value that the caller must
/// keep live, or the task that handles Prometheus scrapes will not run. Returns
/// an error if something goes wrong setting up the endpoint.
pub fn start_metrics_scrape_endpoint(port: u16) -> Result<Runtime> {
    // The default, multi-threaded runtime should suffice for our needs
    let runtime = Runtime::new().context("failed to create runtime for metrics endpoint")?;

    // This task will run forever, so we intentionally drop the returned handle
    runtime.spawn(async move {
        let endpoint = warp::get().and(warp::path("metrics")).map(|| {
            match handle_scrape() {
                Ok(body) => {
                    Response::builder()
                        // https://github.com/prometheus/docs/blob/master/content/docs/instrumenting/exposition_formats.md
                        .header("Content-Type", "text/plain; version=0.0.4")
                        .body(body)
                }
                Err(err) => {
                    slog_scope::error!("unable to scrape Prometheus metrics"; "error" => %err);
                    Response::builder().status(500).body(vec![])
                }
            }
        });

        slog_scope::info!("serving metrics scrapes"; "port" => port);
        warp::serve(endpoint)
            .run(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port))
            .await;
    });

    Ok(runtime)
}

fn handle_scrape() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .context("failed to encode metrics")?;
    Ok(buffer)
}

/// Counters tracking batch ingestion outcomes, registered once at startup
/// and shared across every request handler.
#[derive(Debug)]
pub struct IngestionMetricsCollector {
    pub batches_received: IntCounter,
    pub batches_finished: IntCounterVec,
    pub rows_processed: IntCounterVec,
}

impl IngestionMetricsCollector {
    pub fn new() -> Result<IngestionMetricsCollector> {
        let batches_received: IntCounter = register_int_counter!(
            "order_batch_ingestor_batches_received",
            "Number of batch upload requests received"
        )
        .context("failed to register metrics counter for received batches")?;

        let batches_finished = register_int_counter_vec!(
            "order_batch_ingestor_batches_finished",
            "Number of batch upload requests that finished, by outcome",
            &["outcome"]
        )
        .context("failed to register metrics counter for finished batches")?;

        let rows_processed = register_int_counter_vec!(
            "order_batch_ingestor_rows_processed",
            "Number of rows processed across all batches, by disposition",
            &["disposition"]
        )
        .context("failed to register metrics counter for processed rows")?;

        Ok(IngestionMetricsCollector {
            batches_received,
            batches_finished,
            rows_processed,
        })
    }
}

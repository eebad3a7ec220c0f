use crate::auth::Authenticator;
use crate::domain::clock::BusinessClock;
use crate::domain::idempotency::IdempotencyStore;
use crate::domain::orchestrator::{BatchSummary, Orchestrator};
use crate::domain::snapshot::CatalogSnapshotReader;
use crate::domain::writer::OrderWriter;
use crate::IngestError;
use bytes::Buf;
use chrono::Local;
use futures::TryStreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::{Filter, Rejection, Reply};

/// Everything a request handler needs, grouped so it can be passed to
/// `warp::Filter::and` as a single `warp::any().map(...)` value rather than
/// threaded through as separate filters.
pub struct App {
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub catalog: Arc<dyn CatalogSnapshotReader>,
    pub writer: Arc<dyn OrderWriter>,
    pub clock: Arc<dyn BusinessClock>,
    pub authenticator: Arc<dyn Authenticator>,
}

#[derive(Serialize)]
struct ErrorBody {
    timestamp: String,
    status: u16,
    error: String,
    code: &'static str,
    message: String,
    path: String,
}

#[derive(Serialize)]
struct RowErrorBody {
    #[serde(rename = "lineNumber")]
    line_number: usize,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct BatchSummaryBody {
    #[serde(rename = "batchLoadId")]
    batch_load_id: uuid::Uuid,
    #[serde(rename = "totalProcessed")]
    total_processed: usize,
    #[serde(rename = "storedCount")]
    stored_count: usize,
    #[serde(rename = "errorCount")]
    error_count: usize,
    #[serde(rename = "errorsByCode")]
    errors_by_code: std::collections::HashMap<&'static str, usize>,
    #[serde(rename = "errorDetails")]
    error_details: Vec<RowErrorBody>,
}

impl From<BatchSummary> for BatchSummaryBody {
    fn from(summary: BatchSummary) -> Self {
        BatchSummaryBody {
            batch_load_id: summary.batch_load_id,
            total_processed: summary.total_processed,
            stored_count: summary.stored_count,
            error_count: summary.error_count,
            errors_by_code: summary
                .errors_by_code
                .into_iter()
                .map(|(code, count)| (code.as_str(), count))
                .collect(),
            error_details: summary
                .error_details
                .into_iter()
                .map(|e| RowErrorBody {
                    line_number: e.line_number,
                    code: e.code.as_str(),
                    message: e.message,
                })
                .collect(),
        }
    }
}

fn error_code(err: &IngestError) -> &'static str {
    match err {
        IngestError::FormatInvalid(_) => "FORMAT_INVALID",
        IngestError::FieldRequired(_) => "FIELD_REQUIRED",
        IngestError::AlreadyProcessed => "ALREADY_PROCESSED",
        IngestError::BeingProcessed => "BEING_PROCESSED",
        IngestError::Unauthorized => "UNAUTHORIZED",
        IngestError::Internal(_) => "INTERNAL_ERROR",
    }
}

fn status_for(err: &IngestError) -> StatusCode {
    match err {
        IngestError::FormatInvalid(_) | IngestError::FieldRequired(_) => StatusCode::BAD_REQUEST,
        IngestError::AlreadyProcessed | IngestError::BeingProcessed => StatusCode::CONFLICT,
        IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
        IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(err: IngestError, path: &str) -> impl Reply {
    if let IngestError::Internal(ref cause) = err {
        slog_scope::error!("ingestion failed with an infrastructural error"; "error" => %cause);
    }
    let status = status_for(&err);
    let body = ErrorBody {
        timestamp: Local::now().to_rfc3339(),
        status: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Error").to_owned(),
        code: error_code(&err),
        message: err.to_string(),
        path: path.to_owned(),
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

const INGEST_PATH: &str = "/api/v1/orders/load";

/// Reads the `file` part out of a decoded multipart form, per spec §4.H's
/// requirement that the upload arrive as `multipart/form-data` with a
/// non-empty `file` part.
async fn extract_file_part(form: FormData) -> Result<Vec<u8>, IngestError> {
    let parts: Vec<warp::multipart::Part> = form
        .try_collect()
        .await
        .map_err(|e| IngestError::FormatInvalid(format!("invalid multipart body: {e}")))?;

    for part in parts {
        if part.name() == "file" {
            let mut bytes = Vec::new();
            let mut stream = part.stream();
            while let Some(mut buf) = stream
                .try_next()
                .await
                .map_err(|e| IngestError::FormatInvalid(format!("invalid multipart body: {e}")))?
            {
                while buf.has_remaining() {
                    let chunk = buf.copy_to_bytes(buf.remaining());
                    bytes.extend_from_slice(&chunk);
                }
            }
            if bytes.is_empty() {
                return Err(IngestError::FieldRequired("file"));
            }
            return Ok(bytes);
        }
    }

    Err(IngestError::FieldRequired("file"))
}

async fn handle_ingest(
    idempotency_key: Option<String>,
    authorization: Option<String>,
    form: FormData,
    app: Arc<App>,
) -> Result<Box<dyn Reply>, Infallible> {
    if let Err(e) = app.authenticator.authenticate(authorization.as_deref()) {
        return Ok(Box::new(error_reply(e, INGEST_PATH)));
    }

    let idempotency_key = match idempotency_key {
        Some(k) if !k.is_empty() => k,
        _ => {
            return Ok(Box::new(error_reply(
                IngestError::FieldRequired("Idempotency-Key"),
                INGEST_PATH,
            )))
        }
    };

    let body = match extract_file_part(form).await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(Box::new(error_reply(e, INGEST_PATH))),
    };

    let orchestrator = Orchestrator::new(
        app.idempotency.as_ref(),
        app.catalog.as_ref(),
        app.writer.as_ref(),
        app.clock.as_ref(),
    );

    match orchestrator.ingest(&idempotency_key, &body).await {
        Ok(summary) => {
            // All rows rejected but the run completed is a distinct outcome
            // from "at least one row accepted" per the status-code table.
            let status = if summary.stored_count == 0 && summary.total_processed > 0 {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::CREATED
            };
            let body: BatchSummaryBody = summary.into();
            Ok(Box::new(warp::reply::with_status(
                warp::reply::json(&body),
                status,
            )))
        }
        Err(e) => Ok(Box::new(error_reply(e, INGEST_PATH))),
    }
}

/// Builds the `POST /api/v1/orders/load` filter. A companion
/// `GET /metrics` endpoint is started separately by
/// `metrics::start_metrics_scrape_endpoint`.
pub fn routes(app: Arc<App>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let app = warp::any().map(move || app.clone());

    warp::path!("api" / "v1" / "orders" / "load")
        .and(warp::post())
        .and(warp::header::optional::<String>("Idempotency-Key"))
        .and(warp::header::optional::<String>("Authorization"))
        .and(warp::multipart::form())
        .and(app)
        .and_then(handle_ingest)
}

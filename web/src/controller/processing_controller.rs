//! Controller for the batch transcription pipeline.
//!
//! Thin wrappers only: input validation and parameter mapping live here, the
//! actual work happens in `domain::orchestrator`.

use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::params::processing::{MissingParams, RunParams};
use crate::{AppState, Error};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use log::*;
use service::config::ApiVersion;

/// POST /processing/runs
///
/// Discovers calls in the date range that still need transcription and
/// processes them in batches. Returns the run summary; individual call
/// failures are reported in the summary, never as a failed request.
#[utoipa::path(
    post,
    path = "/processing/runs",
    params(
        ApiVersion,
    ),
    request_body = RunParams,
    responses(
        (status = 200, description = "Run completed, summary returned"),
        (status = 400, description = "Bad Request"),
        (status = 502, description = "A collaborating service failed before any call was processed"),
    )
)]
pub async fn run(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Json(params): Json<RunParams>,
) -> Result<impl IntoResponse, Error> {
    info!(
        "POST processing run from {} to {} (limit: {:?})",
        params.start_date, params.end_date, params.limit
    );

    let (start, end) = params.range();
    let summary = app_state
        .pipeline()
        .run(
            app_state.call_log_conn_ref(),
            app_state.db_conn_ref(),
            start,
            end,
            params.limit,
        )
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), summary)))
}

/// GET /processing/missing
///
/// Previews the calls the next run would pick up, without processing any.
#[utoipa::path(
    get,
    path = "/processing/missing",
    params(
        ApiVersion,
        MissingParams,
    ),
    responses(
        (status = 200, description = "Missing work preview", body = [domain::call_logs::Model]),
        (status = 400, description = "Bad Request"),
    )
)]
pub async fn missing(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Query(params): Query<MissingParams>,
) -> Result<impl IntoResponse, Error> {
    debug!(
        "GET missing work from {} to {}",
        params.start_date, params.end_date
    );

    let (start, end) = params.range();
    let calls = app_state
        .pipeline()
        .discover(
            app_state.call_log_conn_ref(),
            app_state.db_conn_ref(),
            start,
            end,
            params.limit,
        )
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), calls)))
}

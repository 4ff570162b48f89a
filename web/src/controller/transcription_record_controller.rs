//! Controller for persisted transcription records.
//!
//! Read-only: records are only ever written by the processing pipeline.

use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::params::transcription_record::IndexParams;
use crate::{AppState, Error};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use domain::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
use domain::transcription_record as TranscriptionRecordApi;
use domain::transcription_records::Model as TranscriptionRecordModel;
use log::*;
use service::config::ApiVersion;

/// GET /transcription_records
///
/// Lists transcription records within a date range, newest first.
#[utoipa::path(
    get,
    path = "/transcription_records",
    params(
        ApiVersion,
        IndexParams,
    ),
    responses(
        (status = 200, description = "Transcription records retrieved", body = [domain::transcription_records::Model]),
        (status = 400, description = "Bad Request"),
    )
)]
pub async fn index(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!(
        "GET transcription records from {} to {}",
        params.start_date, params.end_date
    );

    let (start, end) = params.range();
    let records =
        TranscriptionRecordApi::find_by_date_range(app_state.db_conn_ref(), start, end).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), records)))
}

/// GET /transcription_records/{contact_id}
///
/// Fetches the transcription record for a single call.
#[utoipa::path(
    get,
    path = "/transcription_records/{contact_id}",
    params(
        ApiVersion,
        ("contact_id" = String, Path, description = "Upstream call contact id"),
    ),
    responses(
        (status = 200, description = "Transcription record retrieved", body = domain::transcription_records::Model),
        (status = 404, description = "No record for this contact id"),
    )
)]
pub async fn read(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Path(contact_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET transcription record for contact: {contact_id}");

    let record: TranscriptionRecordModel =
        TranscriptionRecordApi::find_by_contact_id(app_state.db_conn_ref(), &contact_id)
            .await?
            .ok_or_else(|| {
                Error::domain(domain::error::Error {
                    source: None,
                    error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                        EntityErrorKind::NotFound,
                    )),
                })
            })?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), record)))
}

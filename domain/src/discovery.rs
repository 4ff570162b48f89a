//! Missing-work discovery.
//!
//! Computes the set difference between "calls in the date range with a
//! usable recording path" and "calls already persisted", then drops calls
//! that are excluded, currently locked, or out of retry budget. Running
//! discovery twice with no intervening writes returns the same call set.

use crate::error::Error;
use crate::path_resolver;
use crate::processing_lock::ProcessingLock;
use entity_api::{call_log, call_logs, transcription_record};
use log::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::DatabaseConnection;
use std::collections::HashSet;

/// Returns the calls in `[start, end]` that still need transcription,
/// newest first, optionally truncated to `cap`.
#[allow(clippy::too_many_arguments)]
pub async fn find_missing_work(
    call_log_db: &DatabaseConnection,
    db: &DatabaseConnection,
    start: DateTimeWithTimeZone,
    end: DateTimeWithTimeZone,
    cap: Option<usize>,
    exclusions: &HashSet<String>,
    lock: &ProcessingLock,
    max_attempts: u32,
) -> Result<Vec<call_logs::Model>, Error> {
    let calls = call_log::find_by_date_range(call_log_db, start, end).await?;
    let total = calls.len();

    let transcribable: Vec<call_logs::Model> = calls
        .into_iter()
        .filter(|call| path_resolver::has_plausible_recording(call.recording_location.as_deref()))
        .collect();

    let contact_ids: Vec<String> = transcribable
        .iter()
        .map(|call| call.contact_id.clone())
        .collect();
    let persisted = transcription_record::find_existing_contact_ids(db, &contact_ids).await?;

    let mut missing: Vec<call_logs::Model> = transcribable
        .into_iter()
        .filter(|call| !persisted.contains(&call.contact_id))
        .filter(|call| !exclusions.contains(&call.contact_id))
        .filter(|call| !lock.is_locked(&call.contact_id))
        .filter(|call| !lock.has_exhausted_retries(&call.contact_id, max_attempts))
        .collect();

    if let Some(cap) = cap {
        missing.truncate(cap);
    }

    debug!(
        "Discovery: {total} calls in range, {} persisted, {} missing",
        persisted.len(),
        missing.len()
    );

    Ok(missing)
}

//! Read-only queries against the upstream call log source.
//!
//! The call log database is owned by the call platform. Rows are never
//! inserted, updated or deleted from here.

use super::error::Error;
use entity::call_logs::{Column, Entity, Model};
use log::debug;
use sea_orm::{entity::prelude::*, DatabaseConnection, QueryOrder};

/// Disposition titles that can never yield a usable recording. Filtered in
/// SQL so these calls are never considered transcription work.
pub const EXCLUDED_DISPOSITIONS: &[&str] = &[
    "No Answer",
    "Answering Machine",
    "Voicemail",
    "Busy",
    "Disconnected Number",
    "Dropped Call",
];

/// Fetches call logs within a date range, newest first.
///
/// Rows without an agent or a disposition are excluded along with the
/// known-non-transcribable dispositions.
pub async fn find_by_date_range(
    db: &DatabaseConnection,
    start: DateTimeWithTimeZone,
    end: DateTimeWithTimeZone,
) -> Result<Vec<Model>, Error> {
    debug!("Fetching call logs between {start} and {end}");

    let call_logs = Entity::find()
        .filter(Column::InitiationTimestamp.gte(start))
        .filter(Column::InitiationTimestamp.lte(end))
        .filter(Column::Agent.is_not_null())
        .filter(Column::DispositionTitle.is_not_null())
        .filter(Column::DispositionTitle.is_not_in(EXCLUDED_DISPOSITIONS.iter().copied()))
        .order_by_desc(Column::InitiationTimestamp)
        .all(db)
        .await?;

    Ok(call_logs)
}

/// Finds a single call log by its contact id.
pub async fn find_by_contact_id(
    db: &DatabaseConnection,
    contact_id: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::ContactId.eq(contact_id))
        .one(db)
        .await?)
}

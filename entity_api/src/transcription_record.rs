//! CRUD operations for the transcription_records table.

use super::error::Error;
use entity::transcription_records::{ActiveModel, Column, Entity, Model};
use log::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder};
use std::collections::HashSet;

/// Maximum number of contact ids per existence lookup query. Bounded to keep
/// the generated IN clause (and the request it serves) a sane size.
pub const EXISTENCE_LOOKUP_BATCH_SIZE: usize = 100;

/// Returns true when a record already exists for the given contact id.
pub async fn exists_by_contact_id(
    db: &DatabaseConnection,
    contact_id: &str,
) -> Result<bool, Error> {
    Ok(Entity::find()
        .filter(Column::ContactId.eq(contact_id))
        .one(db)
        .await?
        .is_some())
}

/// Finds a transcription record by contact id.
pub async fn find_by_contact_id(
    db: &DatabaseConnection,
    contact_id: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::ContactId.eq(contact_id))
        .one(db)
        .await?)
}

/// Returns the subset of the given contact ids that already have a persisted
/// record, looked up in batches of [`EXISTENCE_LOOKUP_BATCH_SIZE`].
pub async fn find_existing_contact_ids(
    db: &DatabaseConnection,
    contact_ids: &[String],
) -> Result<HashSet<String>, Error> {
    let mut existing = HashSet::new();

    for chunk in contact_ids.chunks(EXISTENCE_LOOKUP_BATCH_SIZE) {
        let records = Entity::find()
            .filter(Column::ContactId.is_in(chunk.iter().cloned()))
            .all(db)
            .await?;
        existing.extend(records.into_iter().map(|record| record.contact_id));
    }

    Ok(existing)
}

/// Fetches transcription records within a date range, newest first.
pub async fn find_by_date_range(
    db: &DatabaseConnection,
    start: DateTimeWithTimeZone,
    end: DateTimeWithTimeZone,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::InitiationTimestamp.gte(start))
        .filter(Column::InitiationTimestamp.lte(end))
        .order_by_desc(Column::InitiationTimestamp)
        .all(db)
        .await?)
}

/// Inserts or updates the record for `model.contact_id` in a single atomic
/// statement (`INSERT .. ON CONFLICT (contact_id) DO UPDATE`). Concurrent
/// writers for the same key cannot produce a duplicate row.
pub async fn upsert(db: &DatabaseConnection, model: Model) -> Result<(), Error> {
    debug!("Upserting transcription record for: {}", model.contact_id);

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        contact_id: Set(model.contact_id),
        agent: Set(model.agent),
        initiation_timestamp: Set(model.initiation_timestamp),
        queue_name: Set(model.queue_name),
        disposition_title: Set(model.disposition_title),
        campaign_name: Set(model.campaign_name),
        customer_line: Set(model.customer_line),
        call_duration_minutes: Set(model.call_duration_minutes),
        call_duration_seconds: Set(model.call_duration_seconds),
        transcript_text: Set(model.transcript_text),
        speaker_data: Set(model.speaker_data),
        sentiment_analysis: Set(model.sentiment_analysis),
        entities: Set(model.entities),
        call_summary: Set(model.call_summary),
        primary_category: Set(model.primary_category),
        categories: Set(model.categories),
        satisfaction_score: Set(model.satisfaction_score),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Entity::insert(active_model)
        .on_conflict(
            OnConflict::column(Column::ContactId)
                .update_columns([
                    Column::Agent,
                    Column::InitiationTimestamp,
                    Column::QueueName,
                    Column::DispositionTitle,
                    Column::CampaignName,
                    Column::CustomerLine,
                    Column::CallDurationMinutes,
                    Column::CallDurationSeconds,
                    Column::TranscriptText,
                    Column::SpeakerData,
                    Column::SentimentAnalysis,
                    Column::Entities,
                    Column::CallSummary,
                    Column::PrimaryCategory,
                    Column::Categories,
                    Column::SatisfactionScore,
                    Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_lookup_chunking_respects_batch_size() {
        let ids: Vec<String> = (0..250).map(|n| format!("contact-{n}")).collect();
        let chunks: Vec<_> = ids.chunks(EXISTENCE_LOOKUP_BATCH_SIZE).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }
}

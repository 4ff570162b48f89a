//! Mapping and persistence of completed pipeline results.
//!
//! Merges the source call log row with the transcription outcome and the
//! categorization into the durable record shape, serializing the structured
//! fields to JSON text. The write itself is the atomic per-key upsert in
//! `entity_api`, so concurrent writers for the same contact cannot produce a
//! duplicate row.

use crate::categorization::Categorization;
use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use crate::transcription::{SentimentEntry, TranscriptionOutcome};
use crate::gateway::assembly_ai::Sentiment;
use entity_api::{call_logs, transcription_record, transcription_records, Id};
use log::*;
use sea_orm::DatabaseConnection;
use serde::Serialize;

/// Persists the merged result for one call, inserting or updating the record
/// keyed by its contact id.
pub async fn persist(
    db: &DatabaseConnection,
    call: &call_logs::Model,
    outcome: &TranscriptionOutcome,
    categorization: &Categorization,
) -> Result<(), Error> {
    let record = build_record(call, outcome, categorization)?;
    transcription_record::upsert(db, record).await?;
    info!("Persisted transcription record for {}", call.contact_id);
    Ok(())
}

/// Builds the durable record from a call's processing results.
pub fn build_record(
    call: &call_logs::Model,
    outcome: &TranscriptionOutcome,
    categorization: &Categorization,
) -> Result<transcription_records::Model, Error> {
    let now = chrono::Utc::now();

    Ok(transcription_records::Model {
        id: Id::new_v4(),
        contact_id: call.contact_id.clone(),
        agent: call.agent.clone(),
        initiation_timestamp: call.initiation_timestamp,
        queue_name: call.queue_name.clone(),
        disposition_title: call.disposition_title.clone(),
        campaign_name: call.campaign_name.clone(),
        customer_line: call.customer_line.clone(),
        call_duration_minutes: call.call_duration_minutes,
        call_duration_seconds: call.call_duration_seconds,
        transcript_text: Some(outcome.transcript_text.clone()),
        speaker_data: Some(to_json(&outcome.utterances)?),
        sentiment_analysis: Some(to_json(&outcome.sentiment)?),
        entities: Some(to_json(&outcome.entities)?),
        call_summary: outcome.summary.clone(),
        primary_category: Some(categorization.primary_category.clone()),
        categories: Some(to_json(&categorization.categories)?),
        satisfaction_score: satisfaction_score(&outcome.sentiment),
        created_at: now.into(),
        updated_at: now.into(),
    })
}

/// Derives a 0-100 satisfaction score from the sentiment polarity balance.
/// Neutral spans dilute the score toward 50. Returns None when the engine
/// produced no sentiment results at all.
pub fn satisfaction_score(sentiment: &[SentimentEntry]) -> Option<f64> {
    if sentiment.is_empty() {
        return None;
    }

    let positive = sentiment
        .iter()
        .filter(|entry| entry.sentiment == Sentiment::Positive)
        .count() as f64;
    let negative = sentiment
        .iter()
        .filter(|entry| entry.sentiment == Sentiment::Negative)
        .count() as f64;
    let total = sentiment.len() as f64;

    Some(((positive - negative) / total + 1.0) / 2.0 * 100.0)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|err| {
        warn!("Failed to serialize record field: {err:?}");
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to serialize transcription record field".to_string(),
            )),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::{SpeakerRole, SpeakerTurn};

    fn sentiment_entry(sentiment: Sentiment) -> SentimentEntry {
        SentimentEntry {
            text: "span".to_string(),
            sentiment,
            confidence: 0.9,
        }
    }

    fn sample_call() -> call_logs::Model {
        call_logs::Model {
            contact_id: "contact-1".to_string(),
            agent: Some("dsmith".to_string()),
            initiation_timestamp: chrono::Utc::now().fixed_offset(),
            queue_name: Some("Support".to_string()),
            disposition_title: Some("Resolved".to_string()),
            campaign_name: Some("Inbound Support".to_string()),
            campaign_id: Some("101".to_string()),
            customer_line: Some("+15555550100".to_string()),
            call_duration_minutes: Some(4),
            call_duration_seconds: Some(37),
            hold_time_seconds: Some(12),
            queue_time_seconds: Some(45),
            recording_location: Some("./2025/07/14/contact-1.wav".to_string()),
        }
    }

    fn sample_outcome() -> TranscriptionOutcome {
        TranscriptionOutcome {
            transcript_id: "t1".to_string(),
            transcript_text: "Hello. Hi there.".to_string(),
            summary: Some("A short greeting.".to_string()),
            utterances: vec![SpeakerTurn {
                speaker_tag: "A".to_string(),
                role: SpeakerRole::Agent,
                text: "Hello.".to_string(),
                start_ms: 0,
                end_ms: 900,
                confidence: 0.98,
            }],
            sentiment: vec![
                sentiment_entry(Sentiment::Positive),
                sentiment_entry(Sentiment::Neutral),
            ],
            entities: vec![],
        }
    }

    #[test]
    fn satisfaction_score_reflects_polarity_balance() {
        let all_positive = vec![
            sentiment_entry(Sentiment::Positive),
            sentiment_entry(Sentiment::Positive),
        ];
        assert_eq!(satisfaction_score(&all_positive), Some(100.0));

        let all_negative = vec![sentiment_entry(Sentiment::Negative)];
        assert_eq!(satisfaction_score(&all_negative), Some(0.0));

        let balanced = vec![
            sentiment_entry(Sentiment::Positive),
            sentiment_entry(Sentiment::Negative),
        ];
        assert_eq!(satisfaction_score(&balanced), Some(50.0));

        assert_eq!(satisfaction_score(&[]), None);
    }

    #[test]
    fn record_carries_call_fields_and_serialized_results() {
        let call = sample_call();
        let outcome = sample_outcome();
        let categorization = Categorization {
            primary_category: "Billing Inquiry".to_string(),
            categories: vec!["Billing Inquiry".to_string(), "Complaint".to_string()],
        };

        let record = build_record(&call, &outcome, &categorization).unwrap();

        assert_eq!(record.contact_id, "contact-1");
        assert_eq!(record.agent.as_deref(), Some("dsmith"));
        assert_eq!(record.transcript_text.as_deref(), Some("Hello. Hi there."));
        assert_eq!(record.primary_category.as_deref(), Some("Billing Inquiry"));

        // Structured fields round through JSON text storage
        let speaker_data: serde_json::Value =
            serde_json::from_str(record.speaker_data.as_deref().unwrap()).unwrap();
        assert_eq!(speaker_data[0]["speaker_tag"], "A");
        assert_eq!(speaker_data[0]["role"], "Agent");

        let categories: Vec<String> =
            serde_json::from_str(record.categories.as_deref().unwrap()).unwrap();
        assert_eq!(categories, vec!["Billing Inquiry", "Complaint"]);

        // 1 positive, 1 neutral of 2 spans
        assert_eq!(record.satisfaction_score, Some(75.0));
    }
}

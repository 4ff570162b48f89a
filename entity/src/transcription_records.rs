//! SeaORM Entity for the transcription_records table.
//! The durable, enriched result of processing one call's audio.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::transcription_records::Model)]
#[sea_orm(schema_name = "call_insights", table_name = "transcription_records")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    /// Upstream call identifier. At most one record may exist per contact_id;
    /// writes go through an ON CONFLICT upsert against the unique index.
    #[sea_orm(unique)]
    pub contact_id: String,

    pub agent: Option<String>,

    #[schema(value_type = String, format = DateTime)]
    pub initiation_timestamp: DateTimeWithTimeZone,

    pub queue_name: Option<String>,

    pub disposition_title: Option<String>,

    pub campaign_name: Option<String>,

    pub customer_line: Option<String>,

    pub call_duration_minutes: Option<i32>,

    pub call_duration_seconds: Option<i32>,

    /// Full transcript text
    #[sea_orm(column_type = "Text")]
    pub transcript_text: Option<String>,

    /// JSON-serialized utterance list: raw engine speaker tag, derived role,
    /// text, start/end offsets in ms, confidence
    #[sea_orm(column_type = "Text")]
    pub speaker_data: Option<String>,

    /// JSON-serialized sentiment results: {text, sentiment, confidence}
    #[sea_orm(column_type = "Text")]
    pub sentiment_analysis: Option<String>,

    /// JSON-serialized detected entities
    #[sea_orm(column_type = "Text")]
    pub entities: Option<String>,

    /// Engine-generated call summary
    #[sea_orm(column_type = "Text")]
    pub call_summary: Option<String>,

    /// First accepted taxonomy label
    pub primary_category: Option<String>,

    /// JSON-serialized list of accepted taxonomy labels (1-3 entries)
    #[sea_orm(column_type = "Text")]
    pub categories: Option<String>,

    /// Derived from the sentiment polarity balance (0.0 - 100.0)
    pub satisfaction_score: Option<f64>,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

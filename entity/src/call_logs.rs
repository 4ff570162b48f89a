//! SeaORM Entity for the upstream call log table.
//! One row per phone interaction, owned by the call platform. This system
//! only ever reads these rows.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::call_logs::Model)]
#[sea_orm(table_name = "call_logs")]
pub struct Model {
    /// Unique identifier assigned to the call by the upstream platform
    #[sea_orm(primary_key, auto_increment = false)]
    pub contact_id: String,

    /// Agent who handled the call
    pub agent: Option<String>,

    /// When the call was initiated
    #[schema(value_type = String, format = DateTime)]
    pub initiation_timestamp: DateTimeWithTimeZone,

    pub queue_name: Option<String>,

    /// Outcome label chosen by the agent at wrap-up
    pub disposition_title: Option<String>,

    pub campaign_name: Option<String>,

    pub campaign_id: Option<String>,

    /// Customer phone line identifier
    pub customer_line: Option<String>,

    pub call_duration_minutes: Option<i32>,

    pub call_duration_seconds: Option<i32>,

    pub hold_time_seconds: Option<i32>,

    pub queue_time_seconds: Option<i32>,

    /// Path-like pointer to the recording audio on the file store. Possibly
    /// relative, possibly stale, possibly absent.
    pub recording_location: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

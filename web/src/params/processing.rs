use chrono::NaiveDate;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Body for triggering a processing run over a date range.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RunParams {
    /// Inclusive start of the range (YYYY-MM-DD)
    #[schema(value_type = String, example = "2025-07-01")]
    pub start_date: NaiveDate,
    /// Inclusive end of the range (YYYY-MM-DD)
    #[schema(value_type = String, example = "2025-07-14")]
    pub end_date: NaiveDate,
    /// Optional cap on how many calls this run may process
    pub limit: Option<usize>,
}

impl RunParams {
    pub fn range(&self) -> (DateTimeWithTimeZone, DateTimeWithTimeZone) {
        super::transcription_record::date_range(self.start_date, self.end_date)
    }
}

/// Query parameters for previewing missing work.
#[derive(Debug, Deserialize, IntoParams)]
pub struct MissingParams {
    /// Inclusive start of the range (YYYY-MM-DD)
    #[param(value_type = String, example = "2025-07-01")]
    pub start_date: NaiveDate,
    /// Inclusive end of the range (YYYY-MM-DD)
    #[param(value_type = String, example = "2025-07-14")]
    pub end_date: NaiveDate,
    /// Optional cap on how many calls to report
    pub limit: Option<usize>,
}

impl MissingParams {
    pub fn range(&self) -> (DateTimeWithTimeZone, DateTimeWithTimeZone) {
        super::transcription_record::date_range(self.start_date, self.end_date)
    }
}

use chrono::NaiveDate;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Deserialize;
use utoipa::IntoParams;

/// Date-range filter for listing transcription records.
#[derive(Debug, Deserialize, IntoParams)]
pub struct IndexParams {
    /// Inclusive start of the range (YYYY-MM-DD)
    #[param(value_type = String, example = "2025-07-01")]
    pub start_date: NaiveDate,
    /// Inclusive end of the range (YYYY-MM-DD)
    #[param(value_type = String, example = "2025-07-14")]
    pub end_date: NaiveDate,
}

impl IndexParams {
    /// Expands the date range to cover both days fully, in UTC.
    pub fn range(&self) -> (DateTimeWithTimeZone, DateTimeWithTimeZone) {
        date_range(self.start_date, self.end_date)
    }
}

pub(crate) fn date_range(
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> (DateTimeWithTimeZone, DateTimeWithTimeZone) {
    let start = start_date
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
        .fixed_offset();
    let end = end_date
        .and_hms_opt(23, 59, 59)
        .unwrap_or_default()
        .and_utc()
        .fixed_offset();
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_covers_whole_days() {
        let params = IndexParams {
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 14).unwrap(),
        };

        let (start, end) = params.range();
        assert_eq!(start.to_rfc3339(), "2025-07-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-07-14T23:59:59+00:00");
    }
}

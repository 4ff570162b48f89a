use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub use entity::{call_logs, transcription_records, Id};

pub mod call_log;
pub mod error;
pub mod transcription_record;

pub fn naive_date_parse_str(date_str: &str) -> Result<chrono::NaiveDate, error::Error> {
    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| error::Error {
        source: None,
        error_kind: error::EntityApiErrorKind::InvalidQueryTerm,
    })
}

/// Seeds the development call log database with a handful of sample calls in
/// the various recording-location shapes the pipeline has to cope with.
pub async fn seed_database(db: &DatabaseConnection) {
    let now = Utc::now();

    call_logs::ActiveModel {
        contact_id: Set("b1f3a2c4-0001".to_owned()),
        agent: Set(Some("dsmith".to_owned())),
        initiation_timestamp: Set(now.into()),
        queue_name: Set(Some("Support".to_owned())),
        disposition_title: Set(Some("Resolved".to_owned())),
        campaign_name: Set(Some("Inbound Support".to_owned())),
        campaign_id: Set(Some("101".to_owned())),
        customer_line: Set(Some("+15555550100".to_owned())),
        call_duration_minutes: Set(Some(4)),
        call_duration_seconds: Set(Some(37)),
        hold_time_seconds: Set(Some(12)),
        queue_time_seconds: Set(Some(45)),
        // Full path, already carries the dated directory tree
        recording_location: Set(Some(
            "./2025/07/14/b1f3a2c4-0001_20250714-091502.wav".to_owned(),
        )),
    }
    .insert(db)
    .await
    .unwrap();

    call_logs::ActiveModel {
        contact_id: Set("b1f3a2c4-0002".to_owned()),
        agent: Set(Some("mjones".to_owned())),
        initiation_timestamp: Set((now - Duration::days(1)).into()),
        queue_name: Set(Some("Billing".to_owned())),
        disposition_title: Set(Some("Callback Scheduled".to_owned())),
        campaign_name: Set(Some("Inbound Billing".to_owned())),
        campaign_id: Set(Some("102".to_owned())),
        customer_line: Set(Some("+15555550101".to_owned())),
        call_duration_minutes: Set(Some(11)),
        call_duration_seconds: Set(Some(2)),
        hold_time_seconds: Set(Some(0)),
        queue_time_seconds: Set(Some(130)),
        // Bare filename, the day directory has to be probed for
        recording_location: Set(Some("b1f3a2c4-0002_20250713-154210.mp3".to_owned())),
    }
    .insert(db)
    .await
    .unwrap();

    call_logs::ActiveModel {
        contact_id: Set("b1f3a2c4-0003".to_owned()),
        agent: Set(Some("dsmith".to_owned())),
        initiation_timestamp: Set((now - Duration::days(1)).into()),
        queue_name: Set(Some("Sales".to_owned())),
        disposition_title: Set(Some("Sale Made".to_owned())),
        campaign_name: Set(Some("Outbound Renewals".to_owned())),
        campaign_id: Set(Some("204".to_owned())),
        customer_line: Set(Some("+15555550102".to_owned())),
        call_duration_minutes: Set(Some(7)),
        call_duration_seconds: Set(Some(58)),
        hold_time_seconds: Set(Some(33)),
        queue_time_seconds: Set(Some(0)),
        // No recording at all: excluded from discovery, not an error
        recording_location: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
}

//! Read access to persisted transcription records for the web layer.

pub use entity_api::transcription_record::{find_by_contact_id, find_by_date_range};

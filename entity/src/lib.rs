use uuid::Uuid;

pub mod prelude;

// Call analytics entities
pub mod call_logs;
pub mod transcription_records;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;

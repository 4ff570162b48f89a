pub use super::call_logs::Entity as CallLogs;
pub use super::transcription_records::Entity as TranscriptionRecords;

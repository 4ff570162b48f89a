//! Batch orchestration of the transcription pipeline.
//!
//! Discovered calls are processed in fixed-size batches, strictly
//! sequentially, with a deliberate delay between batches to throttle load on
//! the SFTP server and the transcription engine's rate limits. A call's
//! failure is captured into the run summary and never aborts the batch or
//! the run.

use crate::categorization;
use crate::discovery;
use crate::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use crate::gateway::assembly_ai::AssemblyAiClient;
use crate::gateway::sftp::RemoteFileStore;
use crate::path_resolver;
use crate::persistence;
use crate::processing_lock::ProcessingLock;
use crate::transcription::{self, TranscribeOptions};
use entity_api::{call_logs, transcription_record};
use log::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use service::config::Config;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One call's failure, as reported in the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct CallFailure {
    pub contact_id: String,
    pub error: String,
}

/// Aggregated outcome of one orchestrated run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Calls attempted (including ones skipped because another writer
    /// finished them first).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<CallFailure>,
}

enum ProcessOutcome {
    Persisted,
    /// The last-moment existence re-check found the record already written.
    AlreadyPersisted,
}

/// Owns the engine client, the remote file store, and the processing lock,
/// and drives discovered calls through fetch, validation, transcription,
/// categorization and persistence.
pub struct Pipeline {
    config: Config,
    assembly_ai: AssemblyAiClient,
    file_store: Arc<dyn RemoteFileStore>,
    lock: Arc<ProcessingLock>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Builds a pipeline from configuration. A missing AssemblyAI API key is
    /// fatal here rather than mid-run.
    pub fn new(
        config: Config,
        file_store: Arc<dyn RemoteFileStore>,
        lock: Arc<ProcessingLock>,
    ) -> Result<Self, Error> {
        let api_key = config.assembly_ai_api_key().ok_or_else(|| {
            error!("AssemblyAI API key not configured");
            Error::from_kind(DomainErrorKind::Internal(InternalErrorKind::Config))
        })?;
        let assembly_ai = AssemblyAiClient::new(&api_key, config.assembly_ai_base_url())?;

        Ok(Self {
            config,
            assembly_ai,
            file_store,
            lock,
        })
    }

    pub fn lock(&self) -> &ProcessingLock {
        &self.lock
    }

    /// Discovers the calls in range still needing transcription.
    pub async fn discover(
        &self,
        call_log_db: &DatabaseConnection,
        db: &DatabaseConnection,
        start: DateTimeWithTimeZone,
        end: DateTimeWithTimeZone,
        cap: Option<usize>,
    ) -> Result<Vec<call_logs::Model>, Error> {
        discovery::find_missing_work(
            call_log_db,
            db,
            start,
            end,
            cap,
            &HashSet::new(),
            &self.lock,
            self.config.max_processing_attempts,
        )
        .await
    }

    /// Discovers missing work and processes all of it in batches.
    pub async fn run(
        &self,
        call_log_db: &DatabaseConnection,
        db: &DatabaseConnection,
        start: DateTimeWithTimeZone,
        end: DateTimeWithTimeZone,
        cap: Option<usize>,
    ) -> Result<BatchSummary, Error> {
        let calls = self.discover(call_log_db, db, start, end, cap).await?;
        info!("Discovered {} call(s) needing transcription", calls.len());
        Ok(self.process_calls(db, calls).await)
    }

    /// Processes the given calls in batches. Batches run strictly
    /// sequentially, as do the calls within one batch.
    pub async fn process_calls(
        &self,
        db: &DatabaseConnection,
        calls: Vec<call_logs::Model>,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let batch_size = self.config.processing_batch_size.max(1);
        let delay = Duration::from_secs(self.config.inter_batch_delay_secs);

        for (index, batch) in calls.chunks(batch_size).enumerate() {
            if index > 0 {
                debug!("Waiting {delay:?} before the next batch");
                tokio::time::sleep(delay).await;
            }
            info!("Processing batch {} ({} call(s))", index + 1, batch.len());

            for call in batch {
                self.process_one(db, call, &mut summary).await;
            }
        }

        // A panicked task would leak its in-flight claim; end-of-run
        // clearing keeps such calls eligible for the next discovery cycle.
        self.lock.clear_in_flight();

        info!(
            "Run complete: {} processed, {} succeeded, {} failed",
            summary.processed, summary.succeeded, summary.failed
        );
        summary
    }

    async fn process_one(
        &self,
        db: &DatabaseConnection,
        call: &call_logs::Model,
        summary: &mut BatchSummary,
    ) {
        let contact_id = call.contact_id.as_str();

        if !self.lock.try_acquire(contact_id) {
            debug!("{contact_id} is already being processed, skipping");
            return;
        }
        summary.processed += 1;

        // The lock entry is released on every outcome below; an error can
        // never leave the call claimed.
        match self.process_call(db, call).await {
            Ok(ProcessOutcome::AlreadyPersisted) => {
                self.lock.release_success(contact_id);
                debug!("{contact_id} was persisted by another writer, skipping");
                summary.succeeded += 1;
            }
            Ok(ProcessOutcome::Persisted) => {
                self.lock.release_success(contact_id);
                info!("Transcribed and persisted {contact_id}");
                summary.succeeded += 1;
            }
            Err(err) => {
                let attempts = self.lock.release_failure(contact_id);
                warn!("Processing failed for {contact_id} (failure #{attempts}): {err}");
                summary.failed += 1;
                summary.errors.push(CallFailure {
                    contact_id: contact_id.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    async fn process_call(
        &self,
        db: &DatabaseConnection,
        call: &call_logs::Model,
    ) -> Result<ProcessOutcome, Error> {
        // Last-moment guard: another invocation may have completed this call
        // between discovery and now.
        if transcription_record::exists_by_contact_id(db, &call.contact_id).await? {
            return Ok(ProcessOutcome::AlreadyPersisted);
        }

        let location = call.recording_location.as_deref().ok_or_else(|| {
            Error::from_kind(DomainErrorKind::External(ExternalErrorKind::NotFound(
                format!("call {} has no recording location", call.contact_id),
            )))
        })?;

        let candidates = path_resolver::resolve_candidates(
            location,
            self.config.recording_path_prefix().as_deref(),
            chrono::Utc::now().date_naive(),
            self.config.recording_path_lookback_days,
        );

        let options = TranscribeOptions::from_config(&self.config);
        let outcome = transcription::transcribe_recording(
            &self.assembly_ai,
            self.file_store.as_ref(),
            &candidates,
            &options,
        )
        .await?;

        // Categorization degrades internally; it never fails the call.
        let categorization =
            categorization::categorize_transcript(&self.assembly_ai, &outcome.utterances).await;

        persistence::persist(db, call, &outcome, &categorization).await?;
        Ok(ProcessOutcome::Persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::sftp::{MockRemoteFileStore, RemoteFileStat};
    use entity_api::{transcription_records, Id};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serial_test::serial;
    use std::env;

    fn call(contact_id: &str, recording_location: Option<&str>) -> call_logs::Model {
        call_logs::Model {
            contact_id: contact_id.to_string(),
            agent: Some("dsmith".to_string()),
            initiation_timestamp: chrono::Utc::now().fixed_offset(),
            queue_name: Some("Support".to_string()),
            disposition_title: Some("Resolved".to_string()),
            campaign_name: None,
            campaign_id: None,
            customer_line: None,
            call_duration_minutes: Some(3),
            call_duration_seconds: Some(20),
            hold_time_seconds: None,
            queue_time_seconds: None,
            recording_location: recording_location.map(str::to_string),
        }
    }

    fn record(contact_id: &str) -> transcription_records::Model {
        let now = chrono::Utc::now();
        transcription_records::Model {
            id: Id::new_v4(),
            contact_id: contact_id.to_string(),
            agent: None,
            initiation_timestamp: now.fixed_offset(),
            queue_name: None,
            disposition_title: None,
            campaign_name: None,
            customer_line: None,
            call_duration_minutes: None,
            call_duration_seconds: None,
            transcript_text: None,
            speaker_data: None,
            sentiment_analysis: None,
            entities: None,
            call_summary: None,
            primary_category: None,
            categories: None,
            satisfaction_score: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn test_config() -> Config {
        env::set_var("ASSEMBLY_AI_API_KEY", "test_api_key_123");
        env::remove_var("RECORDING_BASE_URL");
        env::remove_var("RECORDING_PATH_PREFIX");
        Config::default()
    }

    #[tokio::test]
    #[serial]
    async fn one_failing_call_does_not_abort_the_batch() {
        let config = test_config();

        // Existence re-checks: c-1 already persisted, c-2 not, c-3 persisted
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![record("c-1")], vec![], vec![record("c-3")]])
            .into_connection();

        // Every candidate path for c-2 is missing on the file store
        let mut store = MockRemoteFileStore::new();
        store.expect_stat().returning(|_| {
            Ok(RemoteFileStat {
                exists: false,
                size: 0,
            })
        });
        store.expect_read().never();

        let lock = Arc::new(ProcessingLock::new());
        let pipeline = Pipeline::new(config, Arc::new(store), Arc::clone(&lock)).unwrap();

        let calls = vec![
            call("c-1", Some("c-1.wav")),
            call("c-2", Some("c-2.wav")),
            call("c-3", Some("c-3.wav")),
        ];
        let summary = pipeline.process_calls(&db, calls).await;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].contact_id, "c-2");
        assert!(summary.errors[0].error.contains("candidate"));

        // The failed call's lock entry was released with its failure counted
        assert!(!lock.is_locked("c-2"));
        assert_eq!(lock.failed_attempts("c-2"), 1);
        // Successful calls have no residual failure count
        assert_eq!(lock.failed_attempts("c-1"), 0);
    }

    #[tokio::test]
    #[serial]
    async fn locked_call_is_not_processed_twice() {
        let config = test_config();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![record("c-1")]])
            .into_connection();

        let lock = Arc::new(ProcessingLock::new());
        // Another invocation already claimed c-2
        lock.try_acquire("c-2");

        let store = MockRemoteFileStore::new();
        let pipeline = Pipeline::new(config, Arc::new(store), Arc::clone(&lock)).unwrap();

        let calls = vec![call("c-1", Some("c-1.wav")), call("c-2", Some("c-2.wav"))];
        let summary = pipeline.process_calls(&db, calls).await;

        // Only c-1 consumed a database query and only c-1 was counted
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    #[serial]
    async fn missing_api_key_is_fatal_at_construction() {
        env::remove_var("ASSEMBLY_AI_API_KEY");
        let config = Config::default();

        let store = MockRemoteFileStore::new();
        let result = Pipeline::new(config, Arc::new(store), Arc::new(ProcessingLock::new()));

        match result.unwrap_err().error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Config) => {}
            other => panic!("Expected Config error, got: {other:?}"),
        }
    }
}

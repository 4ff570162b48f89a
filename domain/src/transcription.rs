//! Transcription submission and polling.
//!
//! One submission requests every analysis the pipeline needs (diarization,
//! sentiment, summarization, entity detection) server-side, then the job is
//! polled on a fixed interval until it completes, errors, or the attempt
//! budget runs out. Engine speaker tags are opaque single letters; they are
//! remapped to domain roles here using the first-tag-is-the-agent
//! convention. That convention is a heuristic, not a guarantee, so the raw
//! engine tag is carried alongside the derived role.

use crate::audio::validate_audio;
use crate::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use crate::fetcher::{fetch_audio, FetchPolicy};
use crate::gateway::assembly_ai::{
    create_standard_transcript_request, AssemblyAiClient, EntityResult, Sentiment,
    TranscriptResponse, TranscriptStatus, Utterance,
};
use crate::gateway::sftp::RemoteFileStore;
use log::*;
use serde::{Deserialize, Serialize};
use service::config::Config;
use std::time::Duration;

/// Poll cadence and budget for a transcription job. The product of the two
/// bounds the total wait, on the order of minutes.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 40,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.poll_max_attempts,
        }
    }
}

/// Domain-meaningful speaker roles on a two-party call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeakerRole {
    Agent,
    Customer,
}

impl std::fmt::Display for SpeakerRole {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeakerRole::Agent => write!(fmt, "Agent"),
            SpeakerRole::Customer => write!(fmt, "Customer"),
        }
    }
}

/// One diarized utterance with both the raw engine tag and the derived role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub speaker_tag: String,
    pub role: SpeakerRole,
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub confidence: f64,
}

/// One sentiment-scored span of the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentEntry {
    pub text: String,
    pub sentiment: Sentiment,
    pub confidence: f64,
}

/// Everything the engine produced for one completed call.
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub transcript_id: String,
    pub transcript_text: String,
    pub summary: Option<String>,
    pub utterances: Vec<SpeakerTurn>,
    pub sentiment: Vec<SentimentEntry>,
    pub entities: Vec<EntityResult>,
}

/// Knobs for one call's transcription, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// When set, the engine is first handed `base_url` joined with the
    /// canonical candidate path instead of bytes uploaded through this
    /// service. Cheaper and faster when the engine can reach it.
    pub recording_base_url: Option<String>,
    pub speakers_expected: u32,
    pub fetch: FetchPolicy,
    pub poll: PollPolicy,
}

impl TranscribeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recording_base_url: config.recording_base_url(),
            speakers_expected: config.expected_speakers,
            fetch: FetchPolicy::default(),
            poll: PollPolicy::from_config(config),
        }
    }
}

/// Transcribes one recording given its ordered candidate paths.
///
/// Strategy (a): submit a directly reachable URL when one can be built.
/// Strategy (b): download over SFTP, validate the container, upload the
/// bytes to the engine, submit the upload URL. (a) falls back to (b)
/// transparently on any failure.
pub async fn transcribe_recording(
    client: &AssemblyAiClient,
    store: &dyn RemoteFileStore,
    candidates: &[String],
    options: &TranscribeOptions,
) -> Result<TranscriptionOutcome, Error> {
    if candidates.is_empty() {
        return Err(Error::from_kind(DomainErrorKind::External(
            ExternalErrorKind::NotFound("call has no resolvable recording path".to_string()),
        )));
    }

    if let Some(base_url) = &options.recording_base_url {
        let direct_url = join_direct_url(base_url, &candidates[0]);
        debug!("Trying direct recording URL: {direct_url}");
        match submit_and_poll(client, &direct_url, options.speakers_expected, &options.poll).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => {
                warn!("Direct URL strategy failed ({err}); falling back to download and re-upload")
            }
        }
    }

    let fetched = fetch_audio(store, candidates, &options.fetch).await?;

    let verdict = validate_audio(&fetched.bytes, Some(&fetched.path));
    if !verdict.valid {
        return Err(Error::from_kind(DomainErrorKind::Internal(
            InternalErrorKind::Validation(format!(
                "{} does not look like audio: {}",
                fetched.path, verdict.reason
            )),
        )));
    }
    if !verdict.high_confidence {
        info!(
            "Submitting {} on extension trust alone: {}",
            fetched.path, verdict.reason
        );
    }

    let upload = client.upload_audio(fetched.bytes).await?;
    submit_and_poll(
        client,
        &upload.upload_url,
        options.speakers_expected,
        &options.poll,
    )
    .await
}

/// Submits a transcription job for `audio_url` and polls it to completion.
pub async fn submit_and_poll(
    client: &AssemblyAiClient,
    audio_url: &str,
    speakers_expected: u32,
    policy: &PollPolicy,
) -> Result<TranscriptionOutcome, Error> {
    let request = create_standard_transcript_request(audio_url.to_string(), speakers_expected);
    let mut transcript = client.create_transcript(request).await?;
    let mut attempts = 0;

    loop {
        match transcript.status {
            TranscriptStatus::Completed => return Ok(build_outcome(transcript)),
            TranscriptStatus::Error => {
                let reason = transcript
                    .error
                    .unwrap_or_else(|| "transcription failed without detail".to_string());
                return Err(Error::from_kind(DomainErrorKind::External(
                    ExternalErrorKind::Engine(format!(
                        "transcript {} failed: {reason}",
                        transcript.id
                    )),
                )));
            }
            TranscriptStatus::Queued | TranscriptStatus::Processing => {
                if attempts >= policy.max_attempts {
                    return Err(Error::from_kind(DomainErrorKind::External(
                        ExternalErrorKind::Timeout(format!(
                            "transcript {} still {} after {} polls",
                            transcript.id, transcript.status, attempts
                        )),
                    )));
                }
                attempts += 1;
                tokio::time::sleep(policy.interval).await;
                transcript = client.get_transcript(&transcript.id).await?;
            }
        }
    }
}

/// Remaps opaque engine speaker tags to domain roles: the first tag
/// encountered is assumed to be the agent, every other tag the customer.
/// Breaks for calls with more than two parties or where the customer speaks
/// first, which is why the raw tag is kept on every turn.
pub fn map_speaker_roles(utterances: &[Utterance]) -> Vec<SpeakerTurn> {
    let mut agent_tag: Option<String> = None;

    utterances
        .iter()
        .map(|utterance| {
            let role = match &agent_tag {
                None => {
                    agent_tag = Some(utterance.speaker.clone());
                    SpeakerRole::Agent
                }
                Some(tag) if *tag == utterance.speaker => SpeakerRole::Agent,
                Some(_) => SpeakerRole::Customer,
            };

            SpeakerTurn {
                speaker_tag: utterance.speaker.clone(),
                role,
                text: utterance.text.clone(),
                start_ms: utterance.start,
                end_ms: utterance.end,
                confidence: utterance.confidence,
            }
        })
        .collect()
}

fn build_outcome(transcript: TranscriptResponse) -> TranscriptionOutcome {
    let utterances = map_speaker_roles(&transcript.utterances.unwrap_or_default());

    let sentiment = transcript
        .sentiment_analysis_results
        .unwrap_or_default()
        .into_iter()
        .map(|result| SentimentEntry {
            text: result.text,
            sentiment: result.sentiment,
            confidence: result.confidence,
        })
        .collect();

    TranscriptionOutcome {
        transcript_id: transcript.id,
        transcript_text: transcript.text.unwrap_or_default(),
        summary: transcript.summary,
        utterances,
        sentiment,
        entities: transcript.entities.unwrap_or_default(),
    }
}

fn join_direct_url(base_url: &str, candidate: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        candidate.trim_start_matches("./").trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::sftp::{MockRemoteFileStore, RemoteFileStat};
    use mockito::{Matcher, Server};

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts: 5,
        }
    }

    fn completed_body() -> String {
        serde_json::json!({
            "id": "t1",
            "status": "completed",
            "text": "Hello, thanks for calling. Hi, I have a billing question.",
            "summary": "Customer called about a billing question.",
            "utterances": [
                {"text": "Hello, thanks for calling.", "start": 0, "end": 2100, "confidence": 0.97, "speaker": "A"},
                {"text": "Hi, I have a billing question.", "start": 2300, "end": 4800, "confidence": 0.95, "speaker": "B"},
                {"text": "Happy to help with that.", "start": 5000, "end": 6400, "confidence": 0.96, "speaker": "A"}
            ],
            "sentiment_analysis_results": [
                {"text": "Hello, thanks for calling.", "start": 0, "end": 2100, "sentiment": "POSITIVE", "confidence": 0.9, "speaker": "A"},
                {"text": "Hi, I have a billing question.", "start": 2300, "end": 4800, "sentiment": "NEUTRAL", "confidence": 0.8, "speaker": "B"}
            ],
            "entities": [
                {"entity_type": "occupation", "text": "billing", "start": 2300, "end": 4800}
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn poll_loop_runs_to_completion_and_remaps_speakers() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/transcript")
            .with_status(200)
            .with_body(r#"{"id": "t1", "status": "queued"}"#)
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/transcript/t1")
            .with_status(200)
            .with_body(completed_body())
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let outcome = submit_and_poll(&client, "http://files/call.wav", 2, &fast_poll())
            .await
            .unwrap();

        assert_eq!(outcome.transcript_id, "t1");
        assert_eq!(outcome.utterances.len(), 3);
        assert_eq!(outcome.utterances[0].role, SpeakerRole::Agent);
        assert_eq!(outcome.utterances[1].role, SpeakerRole::Customer);
        assert_eq!(outcome.utterances[2].role, SpeakerRole::Agent);
        // Raw engine tags survive the remap
        assert_eq!(outcome.utterances[1].speaker_tag, "B");
        assert_eq!(outcome.sentiment.len(), 2);
        assert_eq!(outcome.entities.len(), 1);
    }

    #[tokio::test]
    async fn engine_error_status_fails_the_call() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/transcript")
            .with_status(200)
            .with_body(r#"{"id": "t2", "status": "queued"}"#)
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/transcript/t2")
            .with_status(200)
            .with_body(r#"{"id": "t2", "status": "error", "error": "Download error to audio_url"}"#)
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let result = submit_and_poll(&client, "http://files/call.wav", 2, &fast_poll()).await;

        match result.unwrap_err().error_kind {
            DomainErrorKind::External(ExternalErrorKind::Engine(message)) => {
                assert!(message.contains("Download error"));
            }
            other => panic!("Expected Engine error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn attempt_budget_exhaustion_is_a_timeout() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/transcript")
            .with_status(200)
            .with_body(r#"{"id": "t3", "status": "queued"}"#)
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/transcript/t3")
            .with_status(200)
            .with_body(r#"{"id": "t3", "status": "processing"}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let policy = PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts: 2,
        };
        let result = submit_and_poll(&client, "http://files/call.wav", 2, &policy).await;

        match result.unwrap_err().error_kind {
            DomainErrorKind::External(ExternalErrorKind::Timeout(message)) => {
                assert!(message.contains("after 2 polls"));
            }
            other => panic!("Expected Timeout, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn direct_url_failure_falls_back_to_download_and_upload() {
        let mut server = Server::new_async().await;

        // Strategy (a): the engine cannot reach the direct URL
        let _direct = server
            .mock("POST", "/transcript")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "audio_url": "http://files.example.com/2025/07/14/call.wav"
            })))
            .with_status(500)
            .with_body(r#"{"error": "upstream unreachable"}"#)
            .create_async()
            .await;

        // Strategy (b): upload then submit the upload URL
        let upload_url = format!("{}/uploaded/abc123", server.url());
        let _upload = server
            .mock("POST", "/upload")
            .with_status(200)
            .with_body(format!(r#"{{"upload_url": "{upload_url}"}}"#))
            .create_async()
            .await;
        let _submit = server
            .mock("POST", "/transcript")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "audio_url": upload_url
            })))
            .with_status(200)
            .with_body(r#"{"id": "t1", "status": "queued"}"#)
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/transcript/t1")
            .with_status(200)
            .with_body(completed_body())
            .create_async()
            .await;

        let mut wav = b"RIFF\x24\x08\x00\x00WAVEfmt ".to_vec();
        wav.resize(2048, 0);
        let size = wav.len() as u64;

        let mut store = MockRemoteFileStore::new();
        store
            .expect_stat()
            .returning(move |_| Ok(RemoteFileStat { exists: true, size }));
        store.expect_read().returning(move |_| Ok(wav.clone()));

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let options = TranscribeOptions {
            recording_base_url: Some("http://files.example.com".to_string()),
            speakers_expected: 2,
            fetch: FetchPolicy {
                min_plausible_bytes: 1024,
                ..FetchPolicy::default()
            },
            poll: fast_poll(),
        };

        let candidates = vec!["./2025/07/14/call.wav".to_string()];
        let outcome = transcribe_recording(&client, &store, &candidates, &options)
            .await
            .unwrap();

        assert_eq!(outcome.transcript_id, "t1");
    }

    #[tokio::test]
    async fn invalid_audio_is_rejected_before_any_upload() {
        let server = Server::new_async().await;

        let mut garbage = vec![0x13u8; 2048];
        garbage[0] = 0x00;
        let size = garbage.len() as u64;

        let mut store = MockRemoteFileStore::new();
        store
            .expect_stat()
            .returning(move |_| Ok(RemoteFileStat { exists: true, size }));
        store.expect_read().returning(move |_| Ok(garbage.clone()));

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let options = TranscribeOptions {
            recording_base_url: None,
            speakers_expected: 2,
            fetch: FetchPolicy {
                min_plausible_bytes: 1024,
                ..FetchPolicy::default()
            },
            poll: fast_poll(),
        };

        // A .bin path defeats the extension fallback as well
        let candidates = vec!["./2025/07/14/call.bin".to_string()];
        let result = transcribe_recording(&client, &store, &candidates, &options).await;

        match result.unwrap_err().error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Validation(message)) => {
                assert!(message.contains("does not look like audio"));
            }
            other => panic!("Expected Validation error, got: {other:?}"),
        }
    }
}

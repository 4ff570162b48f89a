//! AssemblyAI API client for transcription services.
//!
//! This module provides an HTTP client for interacting with the AssemblyAI API
//! to transcribe call recordings with speaker diarization, sentiment analysis,
//! summarization and entity detection, and to run LeMUR prompts over
//! completed transcripts.

use crate::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use log::*;
use serde::{Deserialize, Serialize};

/// Request to create a new transcription
#[derive(Debug, Serialize)]
pub struct CreateTranscriptRequest {
    pub audio_url: String,
    pub speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speakers_expected: Option<u32>,
    pub sentiment_analysis: bool,
    pub summarization: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_type: Option<String>,
    pub entity_detection: bool,
}

/// Response from creating or polling a transcript
#[derive(Debug, Deserialize)]
pub struct TranscriptResponse {
    pub id: String,
    pub status: TranscriptStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
    #[serde(default)]
    pub sentiment_analysis_results: Option<Vec<SentimentResult>>,
    #[serde(default)]
    pub entities: Option<Vec<EntityResult>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub audio_duration: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Transcript processing status
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl std::fmt::Display for TranscriptStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptStatus::Queued => write!(fmt, "queued"),
            TranscriptStatus::Processing => write!(fmt, "processing"),
            TranscriptStatus::Completed => write!(fmt, "completed"),
            TranscriptStatus::Error => write!(fmt, "error"),
        }
    }
}

/// Utterance (speaker segment) with timing
#[derive(Debug, Deserialize, Clone)]
pub struct Utterance {
    pub text: String,
    pub start: i64,
    pub end: i64,
    pub confidence: f64,
    pub speaker: String,
}

/// Sentiment analysis result
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SentimentResult {
    pub text: String,
    pub start: i64,
    pub end: i64,
    pub sentiment: Sentiment,
    pub confidence: f64,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Sentiment classification
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Detected entity
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EntityResult {
    pub entity_type: String,
    pub text: String,
    pub start: i64,
    pub end: i64,
}

/// Response from uploading raw audio bytes
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub upload_url: String,
}

// =============================================================================
// LeMUR API Types
// =============================================================================

/// Request for LeMUR custom task
#[derive(Debug, Serialize)]
pub struct LemurTaskRequest {
    /// Transcript IDs to analyze
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_ids: Option<Vec<String>>,
    /// Raw text to analyze instead of referencing stored transcripts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
    /// Custom prompt for the task
    pub prompt: String,
    /// Model to use (e.g., "anthropic/claude-sonnet-4-20250514")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_model: Option<String>,
    /// Maximum output size in tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_size: Option<i32>,
}

/// Response from LeMUR task
#[derive(Debug, Deserialize)]
pub struct LemurTaskResponse {
    /// Unique request ID
    pub request_id: String,
    /// The generated response text (may be JSON)
    pub response: String,
    /// Usage statistics (optional)
    #[serde(default)]
    pub usage: Option<LemurUsage>,
}

/// LeMUR usage statistics
#[derive(Debug, Deserialize, Default)]
pub struct LemurUsage {
    /// Input token count
    pub input_tokens: Option<i32>,
    /// Output token count
    pub output_tokens: Option<i32>,
}

/// AssemblyAI API client
pub struct AssemblyAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl AssemblyAiClient {
    /// Create a new AssemblyAI client with the given API key and base URL
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();

        let mut header_value = reqwest::header::HeaderValue::from_str(api_key).map_err(|e| {
            warn!("Failed to create auth header: {:?}", e);
            Error {
                source: Some(Box::new(e)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Invalid API key format".to_string(),
                )),
            }
        })?;
        header_value.set_sensitive(true);
        headers.insert("authorization", header_value);

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Upload raw audio bytes to AssemblyAI's file store.
    ///
    /// Returns a private URL only usable in subsequent transcript requests
    /// made with the same API key.
    pub async fn upload_audio(&self, audio: Vec<u8>) -> Result<UploadResponse, Error> {
        let url = format!("{}/upload", self.base_url);

        debug!("Uploading {} bytes of audio to AssemblyAI", audio.len());

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to upload audio to AssemblyAI: {:?}", e);
                Error::from(e)
            })?;

        if response.status().is_success() {
            let upload: UploadResponse = response.json().await.map_err(|e| {
                warn!("Failed to parse AssemblyAI upload response: {:?}", e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                        "Invalid response from AssemblyAI".to_string(),
                    )),
                }
            })?;
            info!("Uploaded audio to AssemblyAI: {}", upload.upload_url);
            Ok(upload)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!("AssemblyAI upload API: {}", error_text);
            Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Engine(error_text)),
            })
        }
    }

    /// Create a new transcription request
    pub async fn create_transcript(
        &self,
        request: CreateTranscriptRequest,
    ) -> Result<TranscriptResponse, Error> {
        let url = format!("{}/transcript", self.base_url);

        debug!(
            "Creating AssemblyAI transcript for audio: {}",
            request.audio_url
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to create AssemblyAI transcript: {:?}", e);
                Error::from(e)
            })?;

        if response.status().is_success() {
            let transcript: TranscriptResponse = response.json().await.map_err(|e| {
                warn!("Failed to parse AssemblyAI response: {:?}", e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                        "Invalid response from AssemblyAI".to_string(),
                    )),
                }
            })?;
            info!("Created AssemblyAI transcript with ID: {}", transcript.id);
            Ok(transcript)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!("AssemblyAI API: {}", error_text);
            Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Engine(error_text)),
            })
        }
    }

    /// Get the status of a transcript
    pub async fn get_transcript(&self, transcript_id: &str) -> Result<TranscriptResponse, Error> {
        let url = format!("{}/transcript/{}", self.base_url, transcript_id);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Failed to get AssemblyAI transcript: {:?}", e);
            Error::from(e)
        })?;

        if response.status().is_success() {
            let transcript: TranscriptResponse = response.json().await.map_err(|e| {
                warn!("Failed to parse AssemblyAI response: {:?}", e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                        "Invalid response from AssemblyAI".to_string(),
                    )),
                }
            })?;
            Ok(transcript)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!("AssemblyAI API: {}", error_text);
            Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Engine(error_text)),
            })
        }
    }

    // =========================================================================
    // LeMUR API Methods
    // =========================================================================

    /// Execute a custom LeMUR task with the given prompt
    pub async fn lemur_task(&self, request: LemurTaskRequest) -> Result<LemurTaskResponse, Error> {
        // LeMUR uses a different API path structure than the transcript API.
        // The base_url typically contains "/v2" for transcript endpoints, but
        // LeMUR endpoints use "/lemur/v3/..." without the "/v2" prefix.
        let lemur_base = self.base_url.trim_end_matches("/v2");
        let url = format!("{}/lemur/v3/generate/task", lemur_base);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to execute LeMUR task: {:?}", e);
                Error::from(e)
            })?;

        if response.status().is_success() {
            let result: LemurTaskResponse = response.json().await.map_err(|e| {
                warn!("Failed to parse LeMUR response: {:?}", e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                        "Invalid response from LeMUR".to_string(),
                    )),
                }
            })?;
            debug!("LeMUR task completed: {}", result.request_id);
            Ok(result)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!("LeMUR API: {}", error_text);
            Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Engine(error_text)),
            })
        }
    }
}

/// Helper to create the standard transcript request submitted for every call.
/// All analyses (diarization, sentiment, summarization, entity detection) are
/// requested server-side in this single call; the pipeline never computes
/// these itself.
pub fn create_standard_transcript_request(
    audio_url: String,
    speakers_expected: u32,
) -> CreateTranscriptRequest {
    CreateTranscriptRequest {
        audio_url,
        speaker_labels: true,
        speakers_expected: Some(speakers_expected),
        sentiment_analysis: true,
        summarization: true,
        summary_model: Some("conversational".to_string()),
        summary_type: Some("paragraph".to_string()),
        entity_detection: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_upload_audio_success() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/upload")
            .match_header("authorization", "test_key")
            .with_status(200)
            .with_body(r#"{"upload_url": "https://cdn.assemblyai.com/upload/abc123"}"#)
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let upload = client.upload_audio(vec![0u8; 64]).await.unwrap();
        assert_eq!(upload.upload_url, "https://cdn.assemblyai.com/upload/abc123");
    }

    #[tokio::test]
    async fn test_create_transcript_engine_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/transcript")
            .with_status(400)
            .with_body(r#"{"error": "invalid audio_url"}"#)
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let request = create_standard_transcript_request("http://nowhere/a.wav".to_string(), 2);
        let result = client.create_transcript(request).await;

        match result.unwrap_err().error_kind {
            DomainErrorKind::External(ExternalErrorKind::Engine(_)) => {}
            other => panic!("Expected Engine error, got: {other:?}"),
        }
    }

    #[test]
    fn test_standard_request_flags() {
        let request = create_standard_transcript_request("http://files/a.wav".to_string(), 2);
        assert!(request.speaker_labels);
        assert!(request.sentiment_analysis);
        assert!(request.summarization);
        assert!(request.entity_detection);
        assert_eq!(request.speakers_expected, Some(2));
    }
}

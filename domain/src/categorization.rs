//! Transcript categorization against a fixed closed taxonomy.
//!
//! The categorization engine is asked to pick 1-3 labels for a call, but its
//! response is free text: everything it returns is validated against the
//! taxonomy allow-list before use, and any failure (network, engine error,
//! nothing valid in the response) degrades to the sentinel label instead of
//! failing the call.

use crate::gateway::assembly_ai::{AssemblyAiClient, LemurTaskRequest};
use crate::transcription::SpeakerTurn;
use log::*;
use serde::Serialize;

/// The closed set of permissible category labels.
pub const CATEGORY_TAXONOMY: &[&str] = &[
    "Billing Inquiry",
    "Technical Support",
    "Sales",
    "Account Management",
    "Complaint",
    "Cancellation",
    "General Inquiry",
];

/// Sentinel label applied when the engine fails or returns nothing usable.
pub const FALLBACK_CATEGORY: &str = "Uncategorised";

/// Maximum number of labels kept per call.
const MAX_CATEGORIES: usize = 3;

/// Validated categorization result for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Categorization {
    /// The first accepted label.
    pub primary_category: String,
    /// All accepted labels, 1-3 entries.
    pub categories: Vec<String>,
}

impl Categorization {
    fn fallback() -> Self {
        Self {
            primary_category: FALLBACK_CATEGORY.to_string(),
            categories: vec![FALLBACK_CATEGORY.to_string()],
        }
    }
}

/// Formats diarized utterances into the flat speaker-prefixed transcript the
/// categorization prompt is built from.
pub fn format_transcript(utterances: &[SpeakerTurn]) -> String {
    utterances
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asks the categorization engine for 1-3 taxonomy labels describing the
/// call. Infallible by design: every failure path lands on the fallback
/// label rather than propagating.
pub async fn categorize_transcript(
    client: &AssemblyAiClient,
    utterances: &[SpeakerTurn],
) -> Categorization {
    if utterances.is_empty() {
        debug!("No utterances to categorize, applying fallback label");
        return Categorization::fallback();
    }

    let transcript = format_transcript(utterances);
    let taxonomy = CATEGORY_TAXONOMY.join("\", \"");
    let prompt = format!(
        r#"You are categorizing a call-center conversation between an agent and a customer.

Choose between 1 and 3 categories that best describe the call, ONLY from this list:
["{taxonomy}"]

Return a JSON array of the chosen category names and nothing else, e.g.
["Billing Inquiry", "Complaint"]"#
    );

    let request = LemurTaskRequest {
        transcript_ids: None,
        input_text: Some(transcript),
        prompt,
        final_model: Some("anthropic/claude-sonnet-4-20250514".to_string()),
        max_output_size: Some(100),
    };

    let response = match client.lemur_task(request).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Categorization engine failed ({err}), applying fallback label");
            return Categorization::fallback();
        }
    };

    let categories = parse_labels(&response.response);
    if categories.is_empty() {
        warn!(
            "Categorization response contained no valid taxonomy labels: {}",
            response.response
        );
        return Categorization::fallback();
    }

    Categorization {
        primary_category: categories[0].clone(),
        categories,
    }
}

/// Extracts taxonomy labels from the engine's free-text response.
///
/// Tries a JSON string array first, then falls back to splitting on commas
/// and newlines. Matching against the taxonomy is case-insensitive and the
/// canonical casing is what gets kept. Order is preserved, duplicates are
/// dropped, and at most [`MAX_CATEGORIES`] labels survive.
pub fn parse_labels(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();

    let pieces: Vec<String> = match serde_json::from_str::<Vec<String>>(trimmed) {
        Ok(parsed) => parsed,
        Err(_) => trimmed
            .split(['\n', ','])
            .map(|piece| piece.trim_matches(['"', '[', ']', '-', ' ', '.']).to_string())
            .collect(),
    };

    let mut labels: Vec<String> = Vec::new();
    for piece in pieces {
        let canonical = CATEGORY_TAXONOMY
            .iter()
            .find(|label| label.eq_ignore_ascii_case(piece.trim()));
        if let Some(label) = canonical {
            if !labels.iter().any(|existing| existing == label) {
                labels.push(label.to_string());
            }
        }
        if labels.len() == MAX_CATEGORIES {
            break;
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::SpeakerRole;
    use mockito::Server;

    fn turns() -> Vec<SpeakerTurn> {
        vec![
            SpeakerTurn {
                speaker_tag: "A".to_string(),
                role: SpeakerRole::Agent,
                text: "Thanks for calling, how can I help?".to_string(),
                start_ms: 0,
                end_ms: 2000,
                confidence: 0.97,
            },
            SpeakerTurn {
                speaker_tag: "B".to_string(),
                role: SpeakerRole::Customer,
                text: "My invoice looks wrong this month.".to_string(),
                start_ms: 2100,
                end_ms: 4500,
                confidence: 0.94,
            },
        ]
    }

    #[test]
    fn transcript_is_speaker_prefixed() {
        let formatted = format_transcript(&turns());
        assert_eq!(
            formatted,
            "Agent: Thanks for calling, how can I help?\nCustomer: My invoice looks wrong this month."
        );
    }

    #[test]
    fn parse_labels_accepts_a_json_array() {
        let labels = parse_labels(r#"["Billing Inquiry", "Complaint"]"#);
        assert_eq!(labels, vec!["Billing Inquiry", "Complaint"]);
    }

    #[test]
    fn parse_labels_matches_case_insensitively_with_canonical_casing() {
        let labels = parse_labels(r#"["billing inquiry", "CANCELLATION"]"#);
        assert_eq!(labels, vec!["Billing Inquiry", "Cancellation"]);
    }

    #[test]
    fn parse_labels_rejects_labels_outside_the_taxonomy() {
        let labels = parse_labels(r#"["Billing Inquiry", "Weather Chat", "Complaint"]"#);
        assert_eq!(labels, vec!["Billing Inquiry", "Complaint"]);
    }

    #[test]
    fn parse_labels_caps_at_three_and_dedupes() {
        let labels = parse_labels(
            r#"["Billing Inquiry", "Billing Inquiry", "Complaint", "Sales", "Cancellation"]"#,
        );
        assert_eq!(labels, vec!["Billing Inquiry", "Complaint", "Sales"]);
    }

    #[test]
    fn parse_labels_handles_plain_text_lists() {
        let labels = parse_labels("Billing Inquiry, Complaint");
        assert_eq!(labels, vec!["Billing Inquiry", "Complaint"]);
    }

    #[test]
    fn parse_labels_of_garbage_is_empty() {
        assert!(parse_labels("I could not determine a category.").is_empty());
    }

    #[tokio::test]
    async fn valid_engine_response_becomes_categorization() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/lemur/v3/generate/task")
            .with_status(200)
            .with_body(
                r#"{"request_id": "r1", "response": "[\"Billing Inquiry\", \"Complaint\"]"}"#,
            )
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let categorization = categorize_transcript(&client, &turns()).await;

        assert_eq!(categorization.primary_category, "Billing Inquiry");
        assert_eq!(categorization.categories, vec!["Billing Inquiry", "Complaint"]);
    }

    #[tokio::test]
    async fn engine_failure_degrades_to_fallback() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/lemur/v3/generate/task")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let categorization = categorize_transcript(&client, &turns()).await;

        assert_eq!(categorization.primary_category, FALLBACK_CATEGORY);
        assert_eq!(categorization.categories, vec![FALLBACK_CATEGORY]);
    }

    #[tokio::test]
    async fn unusable_engine_response_degrades_to_fallback() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/lemur/v3/generate/task")
            .with_status(200)
            .with_body(r#"{"request_id": "r2", "response": "Sorry, I cannot help with that."}"#)
            .create_async()
            .await;

        let client = AssemblyAiClient::new("test_key", &server.url()).unwrap();
        let categorization = categorize_transcript(&client, &turns()).await;

        assert_eq!(categorization.primary_category, FALLBACK_CATEGORY);
    }

    #[tokio::test]
    async fn empty_transcript_skips_the_engine() {
        // Client pointed at an unroutable port: a request would error, but
        // the fallback must be applied before any request is attempted.
        let client = AssemblyAiClient::new("test_key", "http://127.0.0.1:1").unwrap();
        let categorization = categorize_transcript(&client, &[]).await;

        assert_eq!(categorization.primary_category, FALLBACK_CATEGORY);
    }
}

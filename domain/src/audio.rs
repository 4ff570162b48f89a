//! Audio container validation.
//!
//! A transcription job costs an engine credit, so downloaded bytes are
//! sniffed against known container signatures before anything is submitted.
//! Some legitimately-audio files from the source system lack clean headers
//! (truncated recordings, non-standard encoders), so an unrecognized header
//! can still pass on the strength of the file's declared extension, at lower
//! confidence.

use serde::Serialize;

/// Buffers smaller than this can never be a real call recording and are
/// rejected regardless of header content.
pub const MIN_AUDIO_BYTES: usize = 100;

/// Extensions trusted when signature sniffing is inconclusive.
const EXTENSION_ALLOW_LIST: &[&str] = &["wav", "mp3", "m4a", "ogg", "flac"];

/// Verdict returned by [`validate_audio`].
#[derive(Debug, Clone, Serialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    /// Container detected from the byte signature, when one matched.
    pub detected_type: Option<&'static str>,
    /// False when the verdict rests on the extension fallback rather than a
    /// recognized signature.
    pub high_confidence: bool,
    pub reason: String,
}

/// Inspects the leading bytes of `buffer` and decides whether it is worth
/// submitting to the transcription engine. `filename_hint` feeds the
/// extension fallback for files with unrecognized headers.
pub fn validate_audio(buffer: &[u8], filename_hint: Option<&str>) -> ValidationVerdict {
    if buffer.len() < MIN_AUDIO_BYTES {
        return ValidationVerdict {
            valid: false,
            detected_type: None,
            high_confidence: true,
            reason: format!(
                "buffer is {} bytes, below the {MIN_AUDIO_BYTES}-byte minimum for real audio",
                buffer.len()
            ),
        };
    }

    if let Some(container) = sniff_container(buffer) {
        return ValidationVerdict {
            valid: true,
            detected_type: Some(container),
            high_confidence: true,
            reason: format!("recognized {container} container signature"),
        };
    }

    if let Some(extension) = allow_listed_extension(filename_hint) {
        return ValidationVerdict {
            valid: true,
            detected_type: None,
            high_confidence: false,
            reason: format!(
                "no known container signature (header {}), trusting .{extension} extension",
                header_hex(buffer)
            ),
        };
    }

    ValidationVerdict {
        valid: false,
        detected_type: None,
        high_confidence: true,
        reason: format!(
            "no known container signature and no trusted extension (header {})",
            header_hex(buffer)
        ),
    }
}

fn sniff_container(buffer: &[u8]) -> Option<&'static str> {
    if buffer.len() >= 12 && &buffer[0..4] == b"RIFF" && &buffer[8..12] == b"WAVE" {
        return Some("wav");
    }
    if buffer.len() >= 3 && &buffer[0..3] == b"ID3" {
        return Some("mp3");
    }
    // Raw MPEG audio: 11-bit frame sync
    if buffer.len() >= 2 && buffer[0] == 0xFF && (buffer[1] & 0xE0) == 0xE0 {
        return Some("mp3");
    }
    if buffer.len() >= 4 && &buffer[0..4] == b"fLaC" {
        return Some("flac");
    }
    if buffer.len() >= 4 && &buffer[0..4] == b"OggS" {
        return Some("ogg");
    }
    if buffer.len() >= 8 && &buffer[4..8] == b"ftyp" {
        return Some("m4a");
    }
    None
}

fn allow_listed_extension(filename_hint: Option<&str>) -> Option<&'static str> {
    let filename = filename_hint?.to_lowercase();
    EXTENSION_ALLOW_LIST
        .iter()
        .find(|ext| filename.ends_with(&format!(".{ext}")))
        .copied()
}

// First bytes rendered as hex for operator-facing diagnostics.
fn header_hex(buffer: &[u8]) -> String {
    buffer
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

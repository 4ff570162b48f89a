//! Candidate-path resolution for call recording locations.
//!
//! Historical recordings were stored under an inconsistent convention: some
//! call logs carry a full dated path, some carry a leading slash or a tenant
//! prefix, and many carry only the bare audio filename even though the file
//! actually lives under a `./YYYY/MM/DD/` capture-date directory. This module
//! owns all of that guessing. Consumers receive an ordered candidate list and
//! let the fetcher's stat call decide which candidate is real; nothing about
//! the storage layout leaks past this interface.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashSet;

/// Extensions accepted as call recording audio.
const AUDIO_EXTENSIONS: &[&str] = &[".wav", ".mp3", ".m4a", ".ogg", ".flac"];

/// Returns true when the stored recording location looks like it could point
/// at an audio file at all. Calls failing this check are non-transcribable
/// and are excluded from discovery rather than treated as errors.
pub fn has_plausible_recording(recording_location: Option<&str>) -> bool {
    let Some(location) = recording_location else {
        return false;
    };

    let decoded = decode(location);
    let lower = decoded.trim().to_lowercase();
    !lower.is_empty() && AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Produces an ordered, deduplicated list of absolute remote paths to probe
/// for the given recording location, most-likely-correct first.
///
/// `today` is an explicit argument so the candidate list is reproducible:
/// given a bare filename and a fixed date the output is fully determined by
/// the lookback window.
pub fn resolve_candidates(
    recording_location: &str,
    tenant_prefix: Option<&str>,
    today: NaiveDate,
    lookback_days: u32,
) -> Vec<String> {
    let decoded = decode(recording_location);
    let trimmed = decoded.trim();

    let mut candidates = Vec::new();

    let stripped = strip_tenant_prefix(trimmed, tenant_prefix);
    let had_prefix = stripped.is_some();
    let location = stripped.unwrap_or_else(|| trimmed.to_string());

    if had_prefix || has_path_marker(&location) {
        // The location already encodes where the file lives; normalize it
        // into the single canonical candidate.
        candidates.push(canonicalize(&location));
    } else {
        // Bare filename: the identifier does not encode the capture date, so
        // probe today's dated directory and the preceding lookback window.
        let filename = location.rsplit('/').next().unwrap_or(&location).to_string();
        for days_back in 0..=i64::from(lookback_days) {
            let date = today - Duration::days(days_back);
            candidates.push(format!(
                "./{}/{:02}/{:02}/{}",
                date.year(),
                date.month(),
                date.day(),
                filename
            ));
        }
    }

    let mut seen = HashSet::new();
    candidates.retain(|candidate| seen.insert(candidate.clone()));
    candidates
}

fn decode(location: &str) -> String {
    urlencoding::decode(location)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| location.to_string())
}

fn strip_tenant_prefix(location: &str, tenant_prefix: Option<&str>) -> Option<String> {
    let prefix = tenant_prefix?;
    if prefix.is_empty() {
        return None;
    }

    let bare = location.trim_start_matches("./").trim_start_matches('/');
    bare.strip_prefix(prefix)
        .map(|rest| rest.trim_start_matches('/').to_string())
}

fn has_path_marker(location: &str) -> bool {
    if location.starts_with("./") || location.starts_with('/') {
        return true;
    }

    location
        .split('/')
        .next()
        .is_some_and(is_year_segment)
}

// A 4-digit 19xx/20xx segment, i.e. the top of a dated directory tree.
fn is_year_segment(segment: &str) -> bool {
    segment.len() == 4
        && segment.chars().all(|c| c.is_ascii_digit())
        && (segment.starts_with("19") || segment.starts_with("20"))
}

fn canonicalize(location: &str) -> String {
    if location.starts_with("./") {
        location.to_string()
    } else if location.starts_with('/') {
        format!(".{location}")
    } else {
        format!("./{location}")
    }
}

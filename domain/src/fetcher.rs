//! Remote audio download with stat verification and scaled timeouts.
//!
//! Candidates produced by the path resolver are probed in order. Each probe
//! stats the remote file first so that nonexistent or implausibly small
//! files never cost a download, then streams the content and verifies the
//! received byte count against the stat size. Call recordings range from
//! seconds to tens of minutes, so the download budget scales with the
//! reported file size instead of being a single fixed value.

use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::gateway::sftp::RemoteFileStore;
use log::*;
use std::time::Duration;
use tokio::time::timeout;

/// Timeout and plausibility knobs for a fetch run. Production values come
/// from [`FetchPolicy::default`]; tests compress them.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Budget for a single stat call.
    pub stat_timeout: Duration,
    /// Base download budget granted to every file regardless of size.
    pub download_base_timeout: Duration,
    /// Additional download time granted per this many bytes of reported size.
    pub download_bytes_per_sec: u64,
    /// Upper bound on the scaled download budget.
    pub download_timeout_cap: Duration,
    /// Files smaller than this are not real call recordings; skip them.
    pub min_plausible_bytes: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            stat_timeout: Duration::from_secs(10),
            download_base_timeout: Duration::from_secs(30),
            download_bytes_per_sec: 256 * 1024,
            download_timeout_cap: Duration::from_secs(300),
            min_plausible_bytes: 8 * 1024,
        }
    }
}

impl FetchPolicy {
    /// Download budget for a file of the given reported size.
    pub fn download_timeout(&self, size: u64) -> Duration {
        let scaled = self.download_base_timeout
            + Duration::from_secs(size / self.download_bytes_per_sec.max(1));
        scaled.min(self.download_timeout_cap)
    }
}

/// A successfully downloaded and size-verified recording.
#[derive(Debug, Clone)]
pub struct FetchedAudio {
    /// The candidate path that turned out to be real.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Probes `candidates` in order and returns the first successfully
/// downloaded, size-verified recording.
///
/// Nonexistent and implausibly small candidates are skipped silently; stat
/// timeouts, transport errors, download timeouts and byte-count mismatches
/// fail the candidate and move on. When every candidate is exhausted the
/// most recent transfer error is returned, or a NotFound error if no
/// candidate ever got as far as a transfer.
pub async fn fetch_audio(
    store: &dyn RemoteFileStore,
    candidates: &[String],
    policy: &FetchPolicy,
) -> Result<FetchedAudio, Error> {
    let mut transfer_error: Option<Error> = None;

    for path in candidates {
        let stat = match timeout(policy.stat_timeout, store.stat(path)).await {
            Ok(Ok(stat)) => stat,
            Ok(Err(err)) => {
                warn!("Stat failed for {path}: {err}");
                transfer_error = Some(err);
                continue;
            }
            Err(_) => {
                warn!(
                    "Stat for {path} exceeded {:?}, abandoning candidate",
                    policy.stat_timeout
                );
                transfer_error = Some(Error::from_kind(DomainErrorKind::External(
                    ExternalErrorKind::Timeout(format!(
                        "stat for {path} exceeded {:?}",
                        policy.stat_timeout
                    )),
                )));
                continue;
            }
        };

        if !stat.exists {
            continue;
        }
        if stat.size < policy.min_plausible_bytes {
            debug!(
                "Skipping {path}: {} bytes is below the {}-byte plausibility floor",
                stat.size, policy.min_plausible_bytes
            );
            continue;
        }

        let budget = policy.download_timeout(stat.size);
        let bytes = match timeout(budget, store.read(path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => {
                warn!("Download failed for {path}: {err}");
                transfer_error = Some(err);
                continue;
            }
            Err(_) => {
                warn!("Download of {path} exceeded its {budget:?} budget");
                transfer_error = Some(Error::from_kind(DomainErrorKind::External(
                    ExternalErrorKind::Timeout(format!(
                        "download of {path} ({} bytes) exceeded {budget:?}",
                        stat.size
                    )),
                )));
                continue;
            }
        };

        if bytes.len() as u64 != stat.size {
            warn!(
                "Byte count mismatch for {path}: stat reported {} but received {}",
                stat.size,
                bytes.len()
            );
            transfer_error = Some(Error::from_kind(DomainErrorKind::External(
                ExternalErrorKind::Other(format!(
                    "downloaded {} bytes from {path} but stat reported {}; treating as a partial transfer",
                    bytes.len(),
                    stat.size
                )),
            )));
            continue;
        }

        debug!("Fetched {} bytes from {path}", bytes.len());
        return Ok(FetchedAudio {
            path: path.clone(),
            bytes,
        });
    }

    Err(transfer_error.unwrap_or_else(|| {
        Error::from_kind(DomainErrorKind::External(ExternalErrorKind::NotFound(
            format!(
                "recording not found after probing {} candidate path(s), starting at {}",
                candidates.len(),
                candidates.first().map(String::as_str).unwrap_or("<none>")
            ),
        )))
    }))
}

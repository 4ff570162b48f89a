//! Remote file store access over SFTP.
//!
//! The call platform drops recording audio onto an SFTP server. This module
//! exposes the two operations the pipeline needs (`stat` and `read`) behind
//! the [`RemoteFileStore`] trait so the fetcher and orchestrator never touch
//! SFTP details directly and tests can substitute a mock store.

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use async_trait::async_trait;
use log::*;
use service::config::Config;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

// SSH_FX_NO_SUCH_FILE from the SFTP protocol.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Result of a remote stat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileStat {
    pub exists: bool,
    pub size: u64,
}

/// Abstraction over the remote store holding call recording audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFileStore: Send + Sync {
    /// Stat a remote path without transferring file content.
    ///
    /// A missing file is reported as `exists: false`, not as an error; only
    /// transport-level failures produce an `Err`.
    async fn stat(&self, path: &str) -> Result<RemoteFileStat, Error>;

    /// Read the full content of a remote file into memory.
    async fn read(&self, path: &str) -> Result<Vec<u8>, Error>;
}

#[derive(Clone)]
struct SftpSettings {
    host: String,
    port: u16,
    username: String,
    password: String,
    socket_timeout: Duration,
}

/// SFTP-backed [`RemoteFileStore`].
///
/// A fresh session is opened per operation inside `spawn_blocking`; libssh2
/// sessions are not shareable across tasks and a batch run performs few
/// enough operations that connection reuse is not worth the shared state.
pub struct SftpFileStore {
    settings: SftpSettings,
}

impl SftpFileStore {
    /// Builds a store from configuration. Missing SFTP credentials are a
    /// configuration error surfaced immediately rather than at first probe.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let host = config.sftp_host().ok_or_else(|| {
            error!("SFTP host not configured");
            Error::from_kind(DomainErrorKind::Internal(InternalErrorKind::Config))
        })?;
        let username = config.sftp_username().ok_or_else(|| {
            error!("SFTP username not configured");
            Error::from_kind(DomainErrorKind::Internal(InternalErrorKind::Config))
        })?;
        let password = config.sftp_password().ok_or_else(|| {
            error!("SFTP password not configured");
            Error::from_kind(DomainErrorKind::Internal(InternalErrorKind::Config))
        })?;

        Ok(Self {
            settings: SftpSettings {
                host,
                port: config.sftp_port,
                username,
                password,
                socket_timeout: Duration::from_secs(15),
            },
        })
    }

    fn connect(settings: &SftpSettings) -> Result<ssh2::Sftp, Error> {
        let addr = (settings.host.as_str(), settings.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                Error::from_kind(DomainErrorKind::Internal(InternalErrorKind::Other(format!(
                    "Could not resolve SFTP host {}",
                    settings.host
                ))))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, settings.socket_timeout)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        // libssh2-level timeout for every blocking call on this session
        session.set_timeout(settings.socket_timeout.as_millis() as u32);
        session.handshake()?;
        session.userauth_password(&settings.username, &settings.password)?;

        Ok(session.sftp()?)
    }
}

#[async_trait]
impl RemoteFileStore for SftpFileStore {
    async fn stat(&self, path: &str) -> Result<RemoteFileStat, Error> {
        let settings = self.settings.clone();
        let path = path.to_string();

        tokio::task::spawn_blocking(move || {
            let sftp = SftpFileStore::connect(&settings)?;
            match sftp.stat(Path::new(&path)) {
                Ok(stat) => Ok(RemoteFileStat {
                    exists: true,
                    size: stat.size.unwrap_or(0),
                }),
                Err(err) if matches!(err.code(), ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => {
                    debug!("Remote file does not exist: {path}");
                    Ok(RemoteFileStat {
                        exists: false,
                        size: 0,
                    })
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
        .map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "SFTP stat task failed".to_string(),
            )),
        })?
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        let settings = self.settings.clone();
        let path = path.to_string();

        tokio::task::spawn_blocking(move || {
            let sftp = SftpFileStore::connect(&settings)?;
            let mut file = sftp.open(Path::new(&path))?;

            let expected = file.stat().ok().and_then(|stat| stat.size).unwrap_or(0);
            let mut buffer = Vec::with_capacity(expected as usize);
            let mut chunk = [0u8; 32 * 1024];
            loop {
                let read = file.read(&mut chunk)?;
                if read == 0 {
                    break;
                }
                buffer.extend_from_slice(&chunk[..read]);
            }

            debug!("Downloaded {} bytes from {path}", buffer.len());
            Ok(buffer)
        })
        .await
        .map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "SFTP read task failed".to_string(),
            )),
        })?
    }
}

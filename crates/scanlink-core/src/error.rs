//! Error types shared by the scanlink crates.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

// ── Transfer errors ──────────────────────────────────────────────────────────

/// Category of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// TCP connect, DNS resolution or SSH handshake failure.
    ConnectionFailed,
    /// The server's host key is unknown or does not match `known_hosts`.
    HostKeyRejected,
    /// Password rejected, or the server does not offer password auth.
    AuthFailed,
    /// Missing remote file or directory, permission denied, remote I/O.
    RemoteFs,
    /// Local file cannot be created, read or written.
    LocalIo,
    /// Caller supplied a malformed directory name, logical name or path.
    InvalidInput,
    /// The worker running a blocking transfer died before reporting back.
    Interrupted,
}

/// The single error type every transfer operation reports.
///
/// Carries a human-readable message plus the underlying cause, reachable
/// through [`std::error::Error::source`].
#[derive(Debug)]
pub struct TransferError {
    pub kind: TransferErrorKind,
    pub message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

pub type TransferResult<T> = Result<T, TransferError>;

impl TransferError {
    pub fn new(kind: TransferErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> TransferErrorKind {
        self.kind
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::ConnectionFailed, msg)
    }

    pub fn host_key_rejected(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::HostKeyRejected, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::AuthFailed, msg)
    }

    pub fn remote_fs(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::RemoteFs, msg)
    }

    pub fn local_io(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::LocalIo, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::InvalidInput, msg)
    }

    pub fn interrupted(msg: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::Interrupted, msg)
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SFTP {:?}] {}", self.kind, self.message)
    }
}

impl StdError for TransferError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        Self::local_io(e.to_string()).with_source(e)
    }
}

// ── Configuration errors ─────────────────────────────────────────────────────

/// Raised while building configuration, before any transfer is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to find {0} configuration")]
    Missing(&'static str),

    #[error("Invalid {field} configuration: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read configuration file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

//! # scanlink
//!
//! Scan manager artifact transfer. Configuration comes from `scanlink-core`,
//! the SFTP work from `scanlink-sftp`; this crate wires them together and
//! owns process-wide logging.

pub use scanlink_core::{
    ConfigError, EndpointConfig, ScanManagerConfig, TransferError, TransferErrorKind, TransferResult,
};
pub use scanlink_sftp::sftp::{
    paths, ArtifactBatch, ArtifactClient, ArtifactPayload, PayloadSource, TransferSession, UploadedArtifacts,
};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins; otherwise `info`.
///
/// `log` records from the library crates are bridged in. With the
/// `logs-json` feature every line is a JSON object. Calling twice is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if cfg!(feature = "logs-json") {
        fmt().with_env_filter(filter).json().with_target(true).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };

    if installed.is_ok() {
        log::debug!("logging initialised");
    }
}

/// Build a transfer client for the endpoint named in `config`.
pub fn client_from_config(config: &ScanManagerConfig) -> ArtifactClient {
    ArtifactClient::new(config.transfer().clone())
}

//! # scanlink-core
//!
//! Shared building blocks for the scanlink crates:
//!   • `config`: scan manager settings and the SFTP endpoint they point at
//!   • `error` : the categorised transfer error and the configuration error

pub mod config;
pub mod error;

pub use config::{EndpointConfig, ScanManagerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_SSH_PORT};
pub use error::{ConfigError, TransferError, TransferErrorKind, TransferResult};

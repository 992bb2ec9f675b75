// ── scanlink-sftp / sftp module ───────────────────────────────────────────────
//
//   • `types`    : payloads handed in by the caller, upload result map
//   • `secret`   : scrubbed credential buffer
//   • `paths`    : remote layout and client-side path resolution
//   • `transport`: connector / channel seam between the session and libssh2
//   • `ssh`      : libssh2-backed connector
//   • `session`  : one authenticated session + SFTP channel, torn down on drop
//   • `client`   : download / upload entry points
//   • `memory`   : in-memory backend for tests (feature `memory-backend`)

pub mod types;
pub mod secret;
pub mod paths;
pub mod transport;
pub mod ssh;
pub mod session;
pub mod client;
#[cfg(any(test, feature = "memory-backend"))]
pub mod memory;

pub use types::*;
pub use secret::{with_secret, SecretBuffer};
pub use transport::{Connection, Connector, FileChannel, SessionLink};
pub use ssh::Ssh2Connector;
pub use session::TransferSession;
pub use client::ArtifactClient;
#[cfg(any(test, feature = "memory-backend"))]
pub use memory::MemoryConnector;

pub use scanlink_core::{EndpointConfig, TransferError, TransferErrorKind, TransferResult};

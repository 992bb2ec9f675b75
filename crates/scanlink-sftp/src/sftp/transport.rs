//! Seam between [`TransferSession`](super::TransferSession) and the SSH library.
//!
//! A [`Connector`] produces an authenticated [`Connection`]; the session then
//! only talks to the two halves through these traits.

use std::io::{Read, Write};

use scanlink_core::{EndpointConfig, TransferResult};

/// An authenticated SSH session plus the SFTP channel opened on it.
///
/// Field order matters: the channel is dropped before the session.
pub struct Connection {
    pub channel: Box<dyn FileChannel>,
    pub link: Box<dyn SessionLink>,
}

/// Opens sessions against an endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    /// Connect, check the host key, authenticate with `password` and open
    /// the SFTP channel. `password` must not outlive this call.
    fn connect(&self, endpoint: &EndpointConfig, password: &str) -> TransferResult<Connection>;
}

/// The SSH session half of a [`Connection`].
pub trait SessionLink {
    fn disconnect(&mut self) -> TransferResult<()>;
}

/// The SFTP channel half of a [`Connection`]. All paths are absolute.
pub trait FileChannel {
    fn realpath(&mut self, path: &str) -> TransferResult<String>;

    /// `Ok(false)` when the path is missing or not a directory.
    fn is_dir(&mut self, path: &str) -> TransferResult<bool>;

    fn mkdir(&mut self, path: &str) -> TransferResult<()>;

    fn open_read(&mut self, path: &str) -> TransferResult<Box<dyn Read + '_>>;

    /// Create or truncate `path` for writing.
    fn create(&mut self, path: &str) -> TransferResult<Box<dyn Write + '_>>;

    fn close(&mut self) -> TransferResult<()>;
}

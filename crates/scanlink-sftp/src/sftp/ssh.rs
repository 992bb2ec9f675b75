use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session, Sftp};

use scanlink_core::{EndpointConfig, TransferError, TransferResult};

use super::transport::{Connection, Connector, FileChannel, SessionLink};

/// libssh2 status for a path that does not exist.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Connector backed by libssh2 over a blocking TCP stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Connector;

impl Connector for Ssh2Connector {
    fn connect(&self, endpoint: &EndpointConfig, password: &str) -> TransferResult<Connection> {
        let addr = endpoint.addr();
        info!("SFTP connecting to {} as {}", addr, endpoint.username);

        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).map_err(|e| {
            TransferError::connection_failed(format!("TCP connection to {} failed", addr)).with_source(e)
        })?;

        let mut session = Session::new()
            .map_err(|e| TransferError::connection_failed("Failed to create SSH session").with_source(e))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| TransferError::connection_failed(format!("SSH handshake with {} failed", addr)).with_source(e))?;

        // From here on the link disconnects itself if any later step fails.
        let link = Ssh2Link {
            session,
            connected: true,
        };

        check_host_key(&link.session, endpoint)?;
        authenticate(&link.session, &endpoint.username, password)?;

        let sftp = link
            .session
            .sftp()
            .map_err(|e| TransferError::remote_fs("Failed to open SFTP channel").with_source(e))?;

        info!("SFTP session established to {}", addr);
        Ok(Connection {
            channel: Box::new(Ssh2Channel { sftp: Some(sftp) }),
            link: Box::new(link),
        })
    }
}

fn known_hosts_file(endpoint: &EndpointConfig) -> Option<PathBuf> {
    endpoint
        .known_hosts_path
        .clone()
        .or_else(|| dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts")))
}

fn check_host_key(session: &Session, endpoint: &EndpointConfig) -> TransferResult<()> {
    if !endpoint.verify_host_key {
        warn!(
            "Host key verification disabled for {}; accepting whatever key the server presents",
            endpoint.addr()
        );
        return Ok(());
    }

    let path = known_hosts_file(endpoint).ok_or_else(|| {
        TransferError::host_key_rejected("No known_hosts file configured and no home directory to look in")
    })?;

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| TransferError::host_key_rejected("Failed to initialise known hosts").with_source(e))?;
    known_hosts
        .read_file(&path, KnownHostFileKind::OpenSSH)
        .map_err(|e| {
            TransferError::host_key_rejected(format!("Cannot read known hosts file '{}'", path.display()))
                .with_source(e)
        })?;

    let (key, _) = session
        .host_key()
        .ok_or_else(|| TransferError::host_key_rejected("Server presented no host key"))?;

    match known_hosts.check_port(&endpoint.host, endpoint.port, key) {
        CheckResult::Match => {
            debug!("Host key for {} matched {}", endpoint.addr(), path.display());
            Ok(())
        }
        CheckResult::Mismatch => Err(TransferError::host_key_rejected(format!(
            "Host key for {} does not match the entry in {}",
            endpoint.addr(),
            path.display()
        ))),
        CheckResult::NotFound => Err(TransferError::host_key_rejected(format!(
            "Host {} is not listed in {}",
            endpoint.addr(),
            path.display()
        ))),
        CheckResult::Failure => Err(TransferError::host_key_rejected(format!(
            "Host key check for {} failed",
            endpoint.addr()
        ))),
    }
}

fn authenticate(session: &Session, username: &str, password: &str) -> TransferResult<()> {
    let methods = session.auth_methods(username).map_err(|e| {
        TransferError::auth_failed(format!("Failed to query auth methods for '{}'", username)).with_source(e)
    })?;
    if !methods.split(',').any(|m| m.trim() == "password") {
        return Err(TransferError::auth_failed(format!(
            "Server does not offer password authentication (offers: {})",
            methods
        )));
    }

    session.userauth_password(username, password).map_err(|e| {
        TransferError::auth_failed(format!("Password authentication rejected for '{}'", username)).with_source(e)
    })?;

    if !session.authenticated() {
        return Err(TransferError::auth_failed(format!(
            "Authentication did not complete for '{}'",
            username
        )));
    }
    Ok(())
}

// ─── Session half ────────────────────────────────────────────────────────────

struct Ssh2Link {
    session: Session,
    connected: bool,
}

impl SessionLink for Ssh2Link {
    fn disconnect(&mut self) -> TransferResult<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.session
            .disconnect(None, "Transfer complete", None)
            .map_err(|e| TransferError::connection_failed("SSH disconnect failed").with_source(e))
    }
}

impl Drop for Ssh2Link {
    fn drop(&mut self) {
        if self.connected {
            if let Err(e) = self.session.disconnect(None, "Client closing", None) {
                debug!("SSH disconnect on drop failed: {}", e);
            }
        }
    }
}

// ─── Channel half ────────────────────────────────────────────────────────────

struct Ssh2Channel {
    sftp: Option<Sftp>,
}

impl Ssh2Channel {
    fn sftp(&self) -> TransferResult<&Sftp> {
        self.sftp
            .as_ref()
            .ok_or_else(|| TransferError::remote_fs("SFTP channel is closed"))
    }
}

impl FileChannel for Ssh2Channel {
    fn realpath(&mut self, path: &str) -> TransferResult<String> {
        let resolved = self.sftp()?.realpath(Path::new(path)).map_err(|e| {
            TransferError::remote_fs(format!("Cannot resolve remote path '{}'", path)).with_source(e)
        })?;
        Ok(resolved.to_string_lossy().into_owned())
    }

    fn is_dir(&mut self, path: &str) -> TransferResult<bool> {
        match self.sftp()?.stat(Path::new(path)) {
            Ok(stat) => Ok(stat.is_dir()),
            Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Ok(false),
            Err(e) => Err(TransferError::remote_fs(format!("Cannot stat remote path '{}'", path)).with_source(e)),
        }
    }

    fn mkdir(&mut self, path: &str) -> TransferResult<()> {
        self.sftp()?.mkdir(Path::new(path), 0o755).map_err(|e| {
            TransferError::remote_fs(format!("Cannot create remote directory '{}'", path)).with_source(e)
        })
    }

    fn open_read(&mut self, path: &str) -> TransferResult<Box<dyn Read + '_>> {
        let file = self.sftp()?.open(Path::new(path)).map_err(|e| {
            TransferError::remote_fs(format!("Cannot open remote file '{}'", path)).with_source(e)
        })?;
        Ok(Box::new(file))
    }

    fn create(&mut self, path: &str) -> TransferResult<Box<dyn Write + '_>> {
        let file = self.sftp()?.create(Path::new(path)).map_err(|e| {
            TransferError::remote_fs(format!("Cannot create remote file '{}'", path)).with_source(e)
        })?;
        Ok(Box::new(file))
    }

    fn close(&mut self) -> TransferResult<()> {
        match self.sftp.take() {
            Some(mut sftp) => sftp
                .shutdown()
                .map_err(|e| TransferError::remote_fs("Failed to close SFTP channel").with_source(e)),
            None => Ok(()),
        }
    }
}

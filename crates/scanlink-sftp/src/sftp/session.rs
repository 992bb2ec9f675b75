use std::io::{Read, Write};

use log::{debug, info, warn};

use scanlink_core::{EndpointConfig, TransferError, TransferResult};

use super::paths;
use super::secret::SecretBuffer;
use super::transport::{Connector, FileChannel, SessionLink};

/// One authenticated SSH session with its SFTP channel.
///
/// Tracks a working directory client-side. Teardown closes the channel,
/// then disconnects the session, and runs on [`close`](Self::close) or drop.
pub struct TransferSession {
    channel: Option<Box<dyn FileChannel>>,
    link: Option<Box<dyn SessionLink>>,
    cwd: String,
}

impl TransferSession {
    /// Authenticate with the endpoint's password. The plaintext copy is
    /// wiped before this returns.
    pub fn open(connector: &dyn Connector, endpoint: &EndpointConfig) -> TransferResult<Self> {
        let mut secret = SecretBuffer::from_secret(&endpoint.password);
        Self::open_with_secret(connector, endpoint, &mut secret)
    }

    /// Same as [`open`](Self::open), using a caller-owned buffer so callers
    /// can observe that it was scrubbed.
    pub fn open_with_secret(
        connector: &dyn Connector,
        endpoint: &EndpointConfig,
        secret: &mut SecretBuffer,
    ) -> TransferResult<Self> {
        let connection = secret.lend(|bytes| {
            let password = std::str::from_utf8(bytes)
                .map_err(|_| TransferError::auth_failed("Transfer password is not valid UTF-8"))?;
            connector.connect(endpoint, password)
        })?;

        let mut session = TransferSession {
            channel: Some(connection.channel),
            link: Some(connection.link),
            cwd: String::from("/"),
        };
        session.cwd = session.channel_mut()?.realpath(".")?;
        info!("SFTP session open on {} (cwd {})", endpoint.addr(), session.cwd);
        Ok(session)
    }

    fn channel_mut(&mut self) -> TransferResult<&mut dyn FileChannel> {
        match self.channel.as_deref_mut() {
            Some(channel) => Ok(channel),
            None => Err(TransferError::remote_fs("SFTP channel is closed")),
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some() && self.link.is_some()
    }

    pub fn pwd(&self) -> &str {
        &self.cwd
    }

    pub fn resolve(&self, path: &str) -> String {
        paths::resolve(&self.cwd, path)
    }

    pub fn cd(&mut self, path: &str) -> TransferResult<()> {
        let target = self.resolve(path);
        if !self.channel_mut()?.is_dir(&target)? {
            return Err(TransferError::remote_fs(format!("No such remote directory: {}", target)));
        }
        debug!("SFTP cd {}", target);
        self.cwd = target;
        Ok(())
    }

    pub fn is_dir(&mut self, path: &str) -> TransferResult<bool> {
        let target = self.resolve(path);
        self.channel_mut()?.is_dir(&target)
    }

    pub fn mkdir(&mut self, path: &str) -> TransferResult<()> {
        let target = self.resolve(path);
        self.channel_mut()?.mkdir(&target)
    }

    pub fn open_read(&mut self, path: &str) -> TransferResult<Box<dyn Read + '_>> {
        let target = self.resolve(path);
        self.channel_mut()?.open_read(&target)
    }

    pub fn create(&mut self, path: &str) -> TransferResult<Box<dyn Write + '_>> {
        let target = self.resolve(path);
        self.channel_mut()?.create(&target)
    }

    /// Close the channel, then disconnect. Both steps are attempted; the
    /// first failure is returned.
    pub fn close(mut self) -> TransferResult<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> TransferResult<()> {
        let mut first_error = None;

        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close() {
                warn!("Failed to close SFTP channel: {}", e);
                first_error = Some(e);
            }
        }

        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.disconnect() {
                warn!("Failed to disconnect SSH session: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for TransferSession {
    fn drop(&mut self) {
        if self.channel.is_some() || self.link.is_some() {
            debug!("SFTP session dropped without close; tearing down");
            // Failures are already logged by teardown.
            let _ = self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::memory::MemoryConnector;
    use crate::sftp::transport::MockConnector;
    use scanlink_core::TransferErrorKind;

    fn endpoint(password: &str) -> EndpointConfig {
        EndpointConfig::new(
            "sftp.internal",
            22,
            "scanner",
            password,
            "/srv/artifacts",
        )
    }

    #[test]
    fn test_open_starts_in_home() {
        let remote = MemoryConnector::new("pw");
        let session = TransferSession::open(&remote, &endpoint("pw")).unwrap();
        assert!(session.is_open());
        assert_eq!(session.pwd(), "/home");
    }

    #[test]
    fn test_secret_scrubbed_on_success() {
        let remote = MemoryConnector::new("pw");
        let ep = endpoint("pw");
        let mut secret = SecretBuffer::from_secret(&ep.password);
        let session = TransferSession::open_with_secret(&remote, &ep, &mut secret).unwrap();
        assert!(secret.is_scrubbed());
        session.close().unwrap();
    }

    #[test]
    fn test_secret_scrubbed_on_auth_failure() {
        let remote = MemoryConnector::new("right");
        let ep = endpoint("wrong");
        let mut secret = SecretBuffer::from_secret(&ep.password);
        let err = TransferSession::open_with_secret(&remote, &ep, &mut secret)
            .err()
            .expect("wrong password must fail");
        assert_eq!(err.kind(), TransferErrorKind::AuthFailed);
        assert!(secret.is_scrubbed());
    }

    #[test]
    fn test_secret_scrubbed_on_connection_failure() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_, _| Err(TransferError::connection_failed("refused")));
        let ep = endpoint("pw");
        let mut secret = SecretBuffer::from_secret(&ep.password);
        let err = TransferSession::open_with_secret(&connector, &ep, &mut secret)
            .err()
            .expect("refused connection must fail");
        assert_eq!(err.kind(), TransferErrorKind::ConnectionFailed);
        assert!(secret.is_scrubbed());
    }

    #[test]
    fn test_connector_sees_plaintext_password() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .withf(|_, password| password == "s3cret")
            .times(1)
            .returning(|_, _| Err(TransferError::auth_failed("stop here")));
        let _ = TransferSession::open(&connector, &endpoint("s3cret"));
    }

    #[test]
    fn test_cd_resolves_and_checks() {
        let remote = MemoryConnector::new("pw").with_dir("/srv/artifacts/scandata");
        let mut session = TransferSession::open(&remote, &endpoint("pw")).unwrap();
        session.cd("/srv/artifacts").unwrap();
        session.cd("scandata").unwrap();
        assert_eq!(session.pwd(), "/srv/artifacts/scandata");
        session.cd("..").unwrap();
        assert_eq!(session.pwd(), "/srv/artifacts");

        let err = session.cd("missing").unwrap_err();
        assert_eq!(err.kind(), TransferErrorKind::RemoteFs);
        assert_eq!(session.pwd(), "/srv/artifacts");
    }

    #[test]
    fn test_close_order_channel_then_session() {
        let remote = MemoryConnector::new("pw");
        let session = TransferSession::open(&remote, &endpoint("pw")).unwrap();
        session.close().unwrap();
        let events = remote.events();
        assert_eq!(
            &events[events.len() - 2..],
            &["channel.close".to_string(), "session.disconnect".to_string()]
        );
    }

    #[test]
    fn test_drop_tears_down_once() {
        let remote = MemoryConnector::new("pw");
        {
            let _session = TransferSession::open(&remote, &endpoint("pw")).unwrap();
        }
        let events = remote.events();
        assert_eq!(events.iter().filter(|e| *e == "channel.close").count(), 1);
        assert_eq!(events.iter().filter(|e| *e == "session.disconnect").count(), 1);
    }

    #[test]
    fn test_disconnect_attempted_when_channel_close_fails() {
        let remote = MemoryConnector::new("pw");
        remote.fail_channel_close();
        let session = TransferSession::open(&remote, &endpoint("pw")).unwrap();
        let err = session.close().unwrap_err();
        assert_eq!(err.kind(), TransferErrorKind::RemoteFs);
        assert!(remote.events().contains(&"session.disconnect".to_string()));
    }
}

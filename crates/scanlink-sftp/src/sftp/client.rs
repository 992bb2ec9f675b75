use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use scanlink_core::{EndpointConfig, TransferError, TransferResult};

use super::paths;
use super::secret::SecretBuffer;
use super::session::TransferSession;
use super::ssh::Ssh2Connector;
use super::transport::Connector;
use super::types::{ArtifactBatch, UploadedArtifacts};

/// Downloads and uploads scan artifacts against one SFTP endpoint.
///
/// Every call opens its own session and tears it down before returning, so
/// a client can be cloned and shared across threads.
#[derive(Clone)]
pub struct ArtifactClient {
    endpoint: Arc<EndpointConfig>,
    connector: Arc<dyn Connector>,
}

impl ArtifactClient {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self::with_connector(endpoint, Arc::new(Ssh2Connector))
    }

    pub fn with_connector(endpoint: EndpointConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            connector,
        }
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    fn open_session(&self, secret: &mut SecretBuffer) -> TransferResult<TransferSession> {
        TransferSession::open_with_secret(self.connector.as_ref(), &self.endpoint, secret)
    }

    /// Endpoints built in code skip the checks done at load time.
    fn check_endpoint(&self) -> TransferResult<()> {
        self.endpoint
            .validate()
            .map_err(|e| TransferError::invalid_input(e.to_string()).with_source(e))
    }

    // ── Download ─────────────────────────────────────────────────

    /// Copy `remote_file` into a newly created (or truncated) `output`.
    ///
    /// The local file is created before any connection is made. Returns the
    /// number of bytes written.
    pub fn download_artifact(&self, remote_file: &str, output: impl AsRef<Path>) -> TransferResult<u64> {
        let mut secret = SecretBuffer::from_secret(&self.endpoint.password);
        self.download_with_secret(remote_file, output.as_ref(), &mut secret)
    }

    pub(crate) fn download_with_secret(
        &self,
        remote_file: &str,
        output: &Path,
        secret: &mut SecretBuffer,
    ) -> TransferResult<u64> {
        self.check_endpoint()?;
        let (parent, name) = paths::split_remote(remote_file)?;

        let local = File::create(output).map_err(|e| {
            TransferError::local_io(format!("Cannot create local file '{}'", output.display())).with_source(e)
        })?;
        let mut writer = BufWriter::new(local);

        let mut session = self.open_session(secret)?;
        let fetched = fetch(&mut session, &parent, name, &mut writer, self.endpoint.chunk_size);

        let flushed = writer.flush();
        drop(writer);
        release(session);

        let bytes = fetched?;
        flushed.map_err(|e| {
            TransferError::local_io(format!("Cannot write local file '{}'", output.display())).with_source(e)
        })?;
        info!("Downloaded {} to {} ({} bytes)", remote_file, output.display(), bytes);
        Ok(bytes)
    }

    // ── Upload ───────────────────────────────────────────────────

    /// Store every payload as `{base}/scandata/{directory}/{logical}.{ext}`.
    ///
    /// The scan directory is created if needed. Payloads are sent in key
    /// order; the first failure aborts the batch and nothing is returned.
    pub fn upload_artifacts(&self, directory: &str, payloads: ArtifactBatch) -> TransferResult<UploadedArtifacts> {
        let mut secret = SecretBuffer::from_secret(&self.endpoint.password);
        self.upload_with_secret(directory, payloads, &mut secret)
    }

    pub(crate) fn upload_with_secret(
        &self,
        directory: &str,
        payloads: ArtifactBatch,
        secret: &mut SecretBuffer,
    ) -> TransferResult<UploadedArtifacts> {
        self.check_endpoint()?;
        paths::validate_segment(directory, "Directory name")?;
        for logical in payloads.keys() {
            paths::validate_segment(logical, "Logical name")?;
        }

        let mut session = self.open_session(secret)?;
        let stored = self.store_all(&mut session, directory, payloads);
        release(session);

        let stored = stored?;
        info!("Uploaded {} artifact(s) to {}", stored.len(), directory);
        Ok(stored)
    }

    fn store_all(
        &self,
        session: &mut TransferSession,
        directory: &str,
        payloads: ArtifactBatch,
    ) -> TransferResult<UploadedArtifacts> {
        let base = &self.endpoint.base_path;
        session.cd(&paths::scan_data_root(base))?;
        ensure_directory(session, directory)?;
        session.cd(directory)?;

        let mut buf = vec![0u8; self.endpoint.chunk_size];
        let mut stored = UploadedArtifacts::new();

        for (logical, payload) in payloads {
            let file_name = paths::unified_file_name(&logical, payload.original_filename());
            let mut source = payload.into_reader()?;
            let mut remote = session.create(&file_name)?;

            let bytes = copy_chunks(
                &mut source,
                &mut remote,
                &mut buf,
                |e| TransferError::local_io(format!("Cannot read payload '{}'", logical)).with_source(e),
                |e| TransferError::remote_fs(format!("Cannot write remote file '{}'", file_name)).with_source(e),
            )?;
            remote
                .flush()
                .map_err(|e| TransferError::remote_fs(format!("Cannot write remote file '{}'", file_name)).with_source(e))?;
            drop(remote);

            debug!("Stored {} as {} ({} bytes)", logical, file_name, bytes);
            stored.insert(logical, paths::artifact_path(base, directory, &file_name)?);
        }
        Ok(stored)
    }

    // ── Async wrappers ───────────────────────────────────────────

    /// Runs [`download_artifact`](Self::download_artifact) on the blocking pool.
    pub async fn download_artifact_async(&self, remote_file: String, output: PathBuf) -> TransferResult<u64> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.download_artifact(&remote_file, &output))
            .await
            .map_err(|e| TransferError::interrupted("Download worker stopped before finishing").with_source(e))?
    }

    /// Runs [`upload_artifacts`](Self::upload_artifacts) on the blocking pool.
    pub async fn upload_artifacts_async(
        &self,
        directory: String,
        payloads: ArtifactBatch,
    ) -> TransferResult<UploadedArtifacts> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.upload_artifacts(&directory, payloads))
            .await
            .map_err(|e| TransferError::interrupted("Upload worker stopped before finishing").with_source(e))?
    }
}

fn fetch(
    session: &mut TransferSession,
    parent: &str,
    name: &str,
    out: &mut impl Write,
    chunk_size: usize,
) -> TransferResult<u64> {
    session.cd(parent)?;
    let mut remote = session.open_read(name)?;
    let mut buf = vec![0u8; chunk_size];
    copy_chunks(
        &mut remote,
        out,
        &mut buf,
        |e| TransferError::remote_fs(format!("Cannot read remote file '{}'", name)).with_source(e),
        |e| TransferError::local_io("Cannot write downloaded data").with_source(e),
    )
}

/// Re-uses `buf` for every chunk until `reader` is exhausted.
fn copy_chunks<R, W>(
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    read_err: impl Fn(io::Error) -> TransferError,
    write_err: impl Fn(io::Error) -> TransferError,
) -> TransferResult<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut total = 0u64;
    loop {
        let n = match reader.read(buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        };
        writer.write_all(&buf[..n]).map_err(&write_err)?;
        total += n as u64;
    }
}

fn ensure_directory(session: &mut TransferSession, name: &str) -> TransferResult<()> {
    match session.mkdir(name) {
        Ok(()) => {
            debug!("Created remote directory {}", session.resolve(name));
            Ok(())
        }
        Err(err) => match session.is_dir(name) {
            Ok(true) => {
                debug!("Remote directory {} already exists", session.resolve(name));
                Ok(())
            }
            _ => Err(err),
        },
    }
}

fn release(session: TransferSession) {
    if session.close().is_err() {
        warn!("SFTP teardown reported an error; transfer result stands");
    }
}

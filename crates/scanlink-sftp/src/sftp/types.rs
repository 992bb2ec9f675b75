use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use scanlink_core::{TransferError, TransferResult};

/// Logical artifact name → full remote path it was stored under.
pub type UploadedArtifacts = BTreeMap<String, String>;

/// Logical artifact name → payload, iterated in key order during upload.
pub type ArtifactBatch = BTreeMap<String, ArtifactPayload>;

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Where the bytes of an uploaded artifact come from.
pub enum PayloadSource {
    Bytes(Vec<u8>),
    File(PathBuf),
    Reader(Box<dyn Read + Send>),
}

/// One artifact handed to `upload_artifacts`.
///
/// `original_filename` only contributes its extension to the stored name.
pub struct ArtifactPayload {
    original_filename: String,
    source: PayloadSource,
}

impl ArtifactPayload {
    pub fn from_bytes(original_filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            original_filename: original_filename.into(),
            source: PayloadSource::Bytes(bytes.into()),
        }
    }

    /// Stream a local file; its own file name supplies the extension.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let original_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            original_filename,
            source: PayloadSource::File(path),
        }
    }

    pub fn from_reader(original_filename: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            original_filename: original_filename.into(),
            source: PayloadSource::Reader(Box::new(reader)),
        }
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn source(&self) -> &PayloadSource {
        &self.source
    }

    /// Turn the payload into a readable stream. Opening a file source may fail.
    pub(crate) fn into_reader(self) -> TransferResult<Box<dyn Read + Send>> {
        match self.source {
            PayloadSource::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes))),
            PayloadSource::File(path) => open_local(&path),
            PayloadSource::Reader(reader) => Ok(reader),
        }
    }
}

fn open_local(path: &Path) -> TransferResult<Box<dyn Read + Send>> {
    let file = File::open(path).map_err(|e| {
        TransferError::local_io(format!("Cannot open local payload '{}'", path.display())).with_source(e)
    })?;
    Ok(Box::new(file))
}

impl fmt::Debug for ArtifactPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            PayloadSource::Bytes(b) => format!("Bytes({} bytes)", b.len()),
            PayloadSource::File(p) => format!("File({})", p.display()),
            PayloadSource::Reader(_) => "Reader".to_string(),
        };
        f.debug_struct("ArtifactPayload")
            .field("original_filename", &self.original_filename)
            .field("source", &source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlink_core::TransferErrorKind;
    use std::io::Write;

    #[test]
    fn test_from_file_uses_own_name() {
        let payload = ArtifactPayload::from_file("/var/tmp/report.final.xml");
        assert_eq!(payload.original_filename(), "report.final.xml");
        assert!(matches!(payload.source(), PayloadSource::File(_)));
    }

    #[test]
    fn test_file_payload_reads_contents() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"<scan/>").unwrap();
        let mut reader = ArtifactPayload::from_file(tmp.path()).into_reader().unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "<scan/>");
    }

    #[test]
    fn test_missing_file_payload_is_local_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactPayload::from_file(dir.path().join("absent.bin"))
            .into_reader()
            .err()
            .expect("opening a missing file must fail");
        assert_eq!(err.kind(), TransferErrorKind::LocalIo);
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let payload = ArtifactPayload::from_bytes("a.txt", vec![7u8; 4096]);
        let shown = format!("{:?}", payload);
        assert!(shown.contains("Bytes(4096 bytes)"));
    }
}

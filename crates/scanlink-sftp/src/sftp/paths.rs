//! Remote path layout.
//!
//! Artifacts live under `{basePath}/scandata/{directory}/{logicalName}.{ext}`.
//! Remote paths always use `/`, independent of the local platform.

use scanlink_core::{TransferError, TransferResult};

/// Fixed directory under the base path that holds every scan directory.
pub const SCAN_DATA_DIRECTORY: &str = "scandata";

const SEPARATOR: char = '/';

fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if parent.ends_with(SEPARATOR) {
        format!("{}{}", parent, child)
    } else {
        format!("{}{}{}", parent, SEPARATOR, child)
    }
}

/// Reject names that would escape or restructure the directory they go into.
pub fn validate_segment(name: &str, what: &str) -> TransferResult<()> {
    if name.is_empty() {
        return Err(TransferError::invalid_input(format!("{} must not be empty", what)));
    }
    if name == "." || name == ".." {
        return Err(TransferError::invalid_input(format!("{} '{}' is not allowed", what, name)));
    }
    if name.contains(SEPARATOR) || name.contains('\\') || name.contains('\0') {
        return Err(TransferError::invalid_input(format!(
            "{} '{}' must be a single path segment",
            what, name
        )));
    }
    Ok(())
}

/// `{base}/scandata`
pub fn scan_data_root(base_path: &str) -> String {
    join(base_path, SCAN_DATA_DIRECTORY)
}

/// `{base}/scandata/{directory}`
pub fn scan_directory(base_path: &str, directory: &str) -> TransferResult<String> {
    validate_segment(directory, "Directory name")?;
    Ok(join(&scan_data_root(base_path), directory))
}

/// `{base}/scandata/{directory}/{file_name}`
pub fn artifact_path(base_path: &str, directory: &str, file_name: &str) -> TransferResult<String> {
    Ok(join(&scan_directory(base_path, directory)?, file_name))
}

/// Text after the last `.` of the final path component, or `""`.
pub fn file_extension(original: &str) -> &str {
    let name = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original);
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    }
}

/// `logical + "." + extension(original)`. Keeps the trailing dot when the
/// original has no extension.
pub fn unified_file_name(logical: &str, original: &str) -> String {
    format!("{}.{}", logical, file_extension(original))
}

/// Split a remote file path into (parent directory, file name).
/// A bare name resolves against the current directory.
pub fn split_remote(path: &str) -> TransferResult<(String, &str)> {
    let (parent, name) = match path.rfind(SEPARATOR) {
        Some(0) => ("/".to_string(), &path[1..]),
        Some(idx) => (path[..idx].to_string(), &path[idx + 1..]),
        None => (".".to_string(), path),
    };
    if name.is_empty() || name == "." || name == ".." {
        return Err(TransferError::invalid_input(format!(
            "Remote path '{}' does not name a file",
            path
        )));
    }
    Ok((parent, name))
}

/// Resolve `path` against `cwd`, folding `.` and `..` segments.
pub fn resolve(cwd: &str, path: &str) -> String {
    let from_root = path.starts_with(SEPARATOR);
    let absolute = from_root || cwd.starts_with(SEPARATOR);
    let mut parts: Vec<&str> = Vec::new();
    let base = if from_root { "" } else { cwd };
    for seg in base.split(SEPARATOR).chain(path.split(SEPARATOR)) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    if absolute {
        format!("/{}", parts.join("/"))
    } else if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlink_core::TransferErrorKind;

    #[test]
    fn test_scan_directory_layout() {
        assert_eq!(scan_directory("/srv/artifacts", "scan-42").unwrap(), "/srv/artifacts/scandata/scan-42");
        assert_eq!(scan_directory("/srv/artifacts/", "scan-42").unwrap(), "/srv/artifacts/scandata/scan-42");
        assert_eq!(scan_directory("/", "x").unwrap(), "/scandata/x");
    }

    #[test]
    fn test_directory_name_must_be_one_segment() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let err = scan_directory("/srv", bad).unwrap_err();
            assert_eq!(err.kind(), TransferErrorKind::InvalidInput, "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(file_extension("results.xml"), "xml");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension("dir.v2/README"), "");
        assert_eq!(file_extension("C:\\tmp\\log.TXT"), "TXT");
    }

    #[test]
    fn test_unified_name() {
        assert_eq!(unified_file_name("report", "results.xml"), "report.xml");
        assert_eq!(unified_file_name("log", "output.txt"), "log.txt");
        assert_eq!(unified_file_name("notes", "README"), "notes.");
    }

    #[test]
    fn test_artifact_path() {
        assert_eq!(
            artifact_path("/srv/artifacts", "scan-42", "report.xml").unwrap(),
            "/srv/artifacts/scandata/scan-42/report.xml"
        );
    }

    #[test]
    fn test_split_remote() {
        assert_eq!(split_remote("/a/b/c.txt").unwrap(), ("/a/b".to_string(), "c.txt"));
        assert_eq!(split_remote("/c.txt").unwrap(), ("/".to_string(), "c.txt"));
        assert_eq!(split_remote("c.txt").unwrap(), (".".to_string(), "c.txt"));
        assert_eq!(split_remote("out/c.txt").unwrap(), ("out".to_string(), "c.txt"));
        assert!(split_remote("/a/b/").is_err());
        assert!(split_remote("").is_err());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/home/scan", "."), "/home/scan");
        assert_eq!(resolve("/home/scan", "out"), "/home/scan/out");
        assert_eq!(resolve("/home/scan", "../other/./x"), "/home/other/x");
        assert_eq!(resolve("/home/scan", "/srv/a"), "/srv/a");
        assert_eq!(resolve("/", ".."), "/");
    }
}

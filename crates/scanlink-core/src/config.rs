// ── Configuration ─────────────────────────────────────────────────────────────
//
// Settings are deserialised into `Raw*` shapes where every key is optional,
// then converted into the validated types. A missing or empty required key is
// reported by name, before any transfer is attempted.

use crate::error::ConfigError;
use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Size of the reusable streaming buffer when the configuration does not set one.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Port used when the transfer endpoint does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

// ── Raw (unvalidated) shapes ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEndpointConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<SecretString>,
    #[serde(default)]
    base_path: Option<String>,
    #[serde(default)]
    verify_host_key: Option<bool>,
    #[serde(default)]
    known_hosts_path: Option<PathBuf>,
    #[serde(default)]
    chunk_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScanManagerConfig {
    #[serde(default)]
    scan_manager_host: Option<String>,
    #[serde(default)]
    scan_manager_port: Option<u16>,
    #[serde(default)]
    scanner_service_host: Option<String>,
    #[serde(default)]
    scanner_service_port: Option<u16>,
    #[serde(default)]
    scan_page_size: Option<u32>,
    #[serde(default)]
    log_page_size: Option<u32>,
    #[serde(default)]
    transfer: Option<RawEndpointConfig>,
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn required_port(value: Option<u16>, key: &'static str) -> Result<u16, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Invalid {
            field: key,
            reason: "port must be between 1 and 65535".into(),
        }),
        Some(p) => Ok(p),
        None => Err(ConfigError::Missing(key)),
    }
}

// ── Endpoint ─────────────────────────────────────────────────────────────────

/// The remote SFTP endpoint that stores scan artifacts.
///
/// `Debug` never prints the password and the type cannot be serialised.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Remote directory under which the `scandata` tree lives.
    pub base_path: String,
    /// Check the server key against `known_hosts` before authenticating.
    /// Turning this off accepts any host key.
    pub verify_host_key: bool,
    /// Defaults to `~/.ssh/known_hosts` when unset.
    pub known_hosts_path: Option<PathBuf>,
    pub chunk_size: usize,
}

impl EndpointConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: SecretString::new(password.into()),
            base_path: base_path.into(),
            verify_host_key: true,
            known_hosts_path: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_verify_host_key(mut self, verify: bool) -> Self {
        self.verify_host_key = verify;
        self
    }

    pub fn with_known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// `host:port`, for log lines and socket addresses.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Re-check the invariants for a value built in code rather than loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("transfer host"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: "transfer port",
                reason: "port must be between 1 and 65535".into(),
            });
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Missing("transfer username"));
        }
        if self.password.expose_secret().is_empty() {
            return Err(ConfigError::Missing("transfer password"));
        }
        if self.base_path.trim().is_empty() {
            return Err(ConfigError::Missing("transfer base path"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "transfer chunk size",
                reason: "chunk size must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

impl TryFrom<RawEndpointConfig> for EndpointConfig {
    type Error = ConfigError;

    fn try_from(raw: RawEndpointConfig) -> Result<Self, Self::Error> {
        let host = required(raw.host, "transfer host")?;
        let port = required_port(Some(raw.port.unwrap_or(DEFAULT_SSH_PORT)), "transfer port")?;
        let username = required(raw.username, "transfer username")?;
        let password = match raw.password {
            Some(p) if !p.expose_secret().is_empty() => p,
            _ => return Err(ConfigError::Missing("transfer password")),
        };
        let base_path = required(raw.base_path, "transfer base path")?;

        let config = EndpointConfig {
            host,
            port,
            username,
            password,
            base_path,
            verify_host_key: raw.verify_host_key.unwrap_or(true),
            known_hosts_path: raw.known_hosts_path,
            chunk_size: raw.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Scan manager ─────────────────────────────────────────────────────────────

/// Scan manager settings, including the artifact transfer endpoint.
///
/// Read-only after loading, except for the scanner service location, which
/// is discovered at runtime and written back through the setters.
#[derive(Debug, Clone)]
pub struct ScanManagerConfig {
    scan_manager_host: String,
    scan_manager_port: u16,
    scanner_service_host: String,
    scanner_service_port: u16,
    scan_page_size: Option<u32>,
    log_page_size: Option<u32>,
    transfer: EndpointConfig,
}

impl ScanManagerConfig {
    /// Parse YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawScanManagerConfig = serde_yaml::from_str(text)?;
        Self::try_from(raw)
    }

    /// Build from an already-parsed key/value map.
    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, ConfigError> {
        let raw: RawScanManagerConfig = serde_json::from_value(serde_json::Value::Object(map))?;
        Self::try_from(raw)
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading scan manager configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn scan_manager_host(&self) -> &str {
        &self.scan_manager_host
    }

    pub fn scan_manager_port(&self) -> u16 {
        self.scan_manager_port
    }

    pub fn scanner_service_host(&self) -> &str {
        &self.scanner_service_host
    }

    pub fn scanner_service_port(&self) -> u16 {
        self.scanner_service_port
    }

    pub fn set_scanner_service_host(&mut self, host: impl Into<String>) {
        self.scanner_service_host = host.into();
    }

    pub fn set_scanner_service_port(&mut self, port: u16) {
        self.scanner_service_port = port;
    }

    pub fn scan_page_size(&self) -> Option<u32> {
        self.scan_page_size
    }

    pub fn log_page_size(&self) -> Option<u32> {
        self.log_page_size
    }

    pub fn transfer(&self) -> &EndpointConfig {
        &self.transfer
    }
}

impl TryFrom<RawScanManagerConfig> for ScanManagerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawScanManagerConfig) -> Result<Self, Self::Error> {
        let scan_manager_host = required(raw.scan_manager_host, "scan manager host")?;
        let scan_manager_port = required_port(raw.scan_manager_port, "scan manager port")?;
        let scanner_service_host = required(raw.scanner_service_host, "scanner service host")?;
        let scanner_service_port =
            required_port(raw.scanner_service_port, "scanner service port")?;
        let transfer = raw
            .transfer
            .ok_or(ConfigError::Missing("transfer"))
            .and_then(EndpointConfig::try_from)?;

        Ok(ScanManagerConfig {
            scan_manager_host,
            scan_manager_port,
            scanner_service_host,
            scanner_service_port,
            // not mandatory, callers fall back to their own page sizes
            scan_page_size: raw.scan_page_size,
            log_page_size: raw.log_page_size,
            transfer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
scanManagerHost: scan-manager.internal
scanManagerPort: 8080
scannerServiceHost: scanner.internal
scannerServicePort: 8081
scanPageSize: 25
transfer:
  host: sftp.internal
  port: 2222
  username: scans
  password: hunter2
  basePath: /srv/artifacts
"#;

    #[test]
    fn test_transfer_port_defaults_to_ssh() {
        let cfg = ScanManagerConfig::from_yaml_str(&FULL.replace("  port: 2222\n", "")).unwrap();
        assert_eq!(cfg.transfer().port, DEFAULT_SSH_PORT);
    }

    #[test]
    fn test_full_config_parses() {
        let cfg = ScanManagerConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(cfg.scan_manager_host(), "scan-manager.internal");
        assert_eq!(cfg.scan_manager_port(), 8080);
        assert_eq!(cfg.scanner_service_port(), 8081);
        assert_eq!(cfg.scan_page_size(), Some(25));
        assert_eq!(cfg.log_page_size(), None);

        let t = cfg.transfer();
        assert_eq!(t.addr(), "sftp.internal:2222");
        assert_eq!(t.username, "scans");
        assert_eq!(t.password.expose_secret(), "hunter2");
        assert_eq!(t.base_path, "/srv/artifacts");
        assert!(t.verify_host_key);
        assert_eq!(t.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_missing_key_is_named() {
        let text = FULL.replace("scannerServiceHost: scanner.internal\n", "");
        let err = ScanManagerConfig::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("scanner service host")));
    }

    #[test]
    fn test_missing_transfer_password() {
        let text = FULL.replace("  password: hunter2\n", "");
        let err = ScanManagerConfig::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("transfer password")));
    }

    #[test]
    fn test_empty_base_path_counts_as_missing() {
        let text = FULL.replace("basePath: /srv/artifacts", "basePath: \"\"");
        let err = ScanManagerConfig::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("transfer base path")));
    }

    #[test]
    fn test_zero_port_rejected() {
        let text = FULL.replace("port: 2222", "port: 0");
        let err = ScanManagerConfig::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "transfer port", .. }));
    }

    #[test]
    fn test_host_key_check_can_be_disabled() {
        let text = format!("{FULL}  verifyHostKey: false\n  chunkSize: 1024\n");
        let cfg = ScanManagerConfig::from_yaml_str(&text).unwrap();
        assert!(!cfg.transfer().verify_host_key);
        assert_eq!(cfg.transfer().chunk_size, 1024);
    }

    #[test]
    fn test_from_map() {
        let value = serde_json::json!({
            "scanManagerHost": "localhost",
            "scanManagerPort": 9090,
            "scannerServiceHost": "localhost",
            "scannerServicePort": 9091,
            "transfer": {
                "host": "localhost",
                "port": 22,
                "username": "u",
                "password": "p",
                "basePath": "/data"
            }
        });
        let map = value.as_object().cloned().unwrap();
        let cfg = ScanManagerConfig::from_map(map).unwrap();
        assert_eq!(cfg.transfer().base_path, "/data");
    }

    #[test]
    fn test_from_map_wrong_type() {
        let value = serde_json::json!({ "scanManagerPort": "not-a-port" });
        let map = value.as_object().cloned().unwrap();
        let err = ScanManagerConfig::from_map(map).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_scanner_service_is_writable() {
        let mut cfg = ScanManagerConfig::from_yaml_str(FULL).unwrap();
        cfg.set_scanner_service_host("10.0.0.7");
        cfg.set_scanner_service_port(40123);
        assert_eq!(cfg.scanner_service_host(), "10.0.0.7");
        assert_eq!(cfg.scanner_service_port(), 40123);
    }

    #[test]
    fn test_debug_redacts_password() {
        let cfg = ScanManagerConfig::from_yaml_str(FULL).unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let cfg = ScanManagerConfig::load(file.path()).unwrap();
        assert_eq!(cfg.transfer().port, 2222);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ScanManagerConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_built_endpoint() {
        let ok = EndpointConfig::new("h", 22, "u", "p", "/base");
        assert!(ok.validate().is_ok());

        let no_password = EndpointConfig::new("h", 22, "u", "", "/base");
        assert!(matches!(
            no_password.validate(),
            Err(ConfigError::Missing("transfer password"))
        ));

        let zero_chunk = EndpointConfig::new("h", 22, "u", "p", "/base").with_chunk_size(0);
        assert!(matches!(zero_chunk.validate(), Err(ConfigError::Invalid { .. })));
    }
}

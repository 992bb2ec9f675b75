use std::io::Write;

use scanlink::{ConfigError, ScanManagerConfig};

#[test]
fn load_from_file_and_override_scanner_service() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "scanManagerHost: manager.internal\n\
         scanManagerPort: 8443\n\
         scannerServiceHost: scanner.internal\n\
         scannerServicePort: 9090\n\
         transfer:\n  \
           host: sftp.internal\n  \
           port: 2222\n  \
           username: scanner\n  \
           password: s3cret\n  \
           basePath: /srv/artifacts"
    )
    .unwrap();

    let mut config = ScanManagerConfig::load(file.path()).unwrap();
    assert_eq!(config.transfer().addr(), "sftp.internal:2222");
    assert!(config.transfer().verify_host_key);

    config.set_scanner_service_host("10.0.0.9");
    config.set_scanner_service_port(9191);
    assert_eq!(config.scanner_service_host(), "10.0.0.9");
    assert_eq!(config.scanner_service_port(), 9191);
}

#[test]
fn missing_transfer_section_is_reported() {
    let err = ScanManagerConfig::from_yaml_str(
        "scanManagerHost: m\nscanManagerPort: 1\nscannerServiceHost: s\nscannerServicePort: 2\n",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Missing("transfer")));
}

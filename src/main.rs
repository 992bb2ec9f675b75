// scanlink CLI
//
// Usage:
//   scanlink <config.yaml> download <remote-file> <local-file>
//   scanlink <config.yaml> upload <directory> <logical>=<file> [<logical>=<file> ...]

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use log::error;

use scanlink::{client_from_config, init_logging, ArtifactBatch, ArtifactPayload, ScanManagerConfig};

enum Command {
    Download { remote: String, local: PathBuf },
    Upload { directory: String, payloads: ArtifactBatch },
}

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG=debug scanlink config.yaml download /srv/a.txt a.txt
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("{}", msg);
            print_usage();
            return ExitCode::from(2);
        }
    };

    let config = match ScanManagerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let client = client_from_config(&config);

    let outcome = match command {
        Command::Download { remote, local } => client
            .download_artifact_async(remote, local.clone())
            .await
            .map(|bytes| println!("{} bytes written to {}", bytes, local.display())),
        Command::Upload { directory, payloads } => client
            .upload_artifacts_async(directory, payloads)
            .await
            .map(|stored| match serde_json::to_string_pretty(&stored) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Cannot render upload result: {}", e),
            }),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<(PathBuf, Command), String> {
    let (config, rest) = args.split_first().ok_or("Missing configuration file")?;
    let (verb, rest) = rest.split_first().ok_or("Missing command")?;

    let command = match verb.as_str() {
        "download" => match rest {
            [remote, local] => Command::Download {
                remote: remote.clone(),
                local: PathBuf::from(local),
            },
            _ => return Err("download takes <remote-file> <local-file>".to_string()),
        },
        "upload" => {
            let (directory, items) = rest.split_first().ok_or("upload needs a directory")?;
            let mut payloads = ArtifactBatch::new();
            for item in items {
                let (logical, file) = item
                    .split_once('=')
                    .ok_or_else(|| format!("Expected <logical>=<file>, got '{}'", item))?;
                payloads.insert(logical.to_string(), ArtifactPayload::from_file(file));
            }
            Command::Upload {
                directory: directory.clone(),
                payloads,
            }
        }
        other => return Err(format!("Unknown command '{}'", other)),
    };
    Ok((PathBuf::from(config), command))
}

fn print_usage() {
    eprintln!("scanlink - scan artifact transfer");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  scanlink <config.yaml> download <remote-file> <local-file>");
    eprintln!("  scanlink <config.yaml> upload <directory> <logical>=<file> [...]");
}

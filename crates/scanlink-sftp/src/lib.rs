//! # scanlink – SFTP artifact transfer
//!
//! Moves scan artifacts between the scan manager and its SFTP storage:
//!   • One authenticated session + SFTP channel per operation, always torn down
//!   • Password-only authentication with optional known-hosts verification
//!   • Transfer password held in a buffer that is zeroed right after use
//!   • Canonical remote layout `{basePath}/scandata/{directory}/{name}.{ext}`
//!   • Single-file download and all-or-nothing batch upload

pub mod sftp;

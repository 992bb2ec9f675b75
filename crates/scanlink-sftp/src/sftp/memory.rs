//! In-memory SFTP backend.
//!
//! Behaves like a small remote filesystem behind a [`Connector`], records
//! every lifecycle call in order and can be told to fail at specific points.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use scanlink_core::{EndpointConfig, TransferError, TransferResult};

use super::paths;
use super::transport::{Connection, Connector, FileChannel, SessionLink};

#[derive(Debug, Default)]
struct Faults {
    refuse_connections: bool,
    deny_mkdir: bool,
    fail_channel_close: bool,
    fail_disconnect: bool,
    poisoned_writes: BTreeSet<String>,
}

#[derive(Debug)]
struct MemoryState {
    password: String,
    home: String,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    events: Vec<String>,
    connect_calls: usize,
    faults: Faults,
}

/// Shared handle to an in-memory remote. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parent_of(path: &str) -> String {
    paths::resolve(path, "..")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl MemoryConnector {
    /// Remote that accepts `password` and has only `/` and `/home` present.
    pub fn new(password: impl Into<String>) -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        dirs.insert("/home".to_string());
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                password: password.into(),
                home: "/home".to_string(),
                files: BTreeMap::new(),
                dirs,
                events: Vec::new(),
                connect_calls: 0,
                faults: Faults::default(),
            })),
        }
    }

    /// Create `path` and every missing ancestor.
    pub fn with_dir(self, path: &str) -> Self {
        {
            let mut state = lock(&self.state);
            let mut current = String::new();
            for seg in path.split('/').filter(|s| !s.is_empty()) {
                current = format!("{}/{}", current, seg);
                state.dirs.insert(current.clone());
            }
        }
        self
    }

    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        let this = self.with_dir(&parent_of(path));
        lock(&this.state).files.insert(path.to_string(), contents.into());
        this
    }

    // ── Fault injection ──────────────────────────────────────────

    pub fn refuse_connections(&self) {
        lock(&self.state).faults.refuse_connections = true;
    }

    pub fn deny_mkdir(&self) {
        lock(&self.state).faults.deny_mkdir = true;
    }

    pub fn fail_channel_close(&self) {
        lock(&self.state).faults.fail_channel_close = true;
    }

    pub fn fail_disconnect(&self) {
        lock(&self.state).faults.fail_disconnect = true;
    }

    /// Writes to any remote file whose name is `file_name` fail.
    pub fn poison_writes_to(&self, file_name: &str) {
        lock(&self.state).faults.poisoned_writes.insert(file_name.to_string());
    }

    // ── Inspection ───────────────────────────────────────────────

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.state).files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        lock(&self.state).dirs.contains(path)
    }

    pub fn files_under(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        lock(&self.state)
            .files
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Vec<String> {
        lock(&self.state).events.clone()
    }

    pub fn connect_calls(&self) -> usize {
        lock(&self.state).connect_calls
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, endpoint: &EndpointConfig, password: &str) -> TransferResult<Connection> {
        let mut state = lock(&self.state);
        state.connect_calls += 1;
        state.events.push("connect".to_string());
        if state.faults.refuse_connections {
            return Err(TransferError::connection_failed(format!(
                "Connection to {} refused",
                endpoint.addr()
            )));
        }
        if password != state.password {
            return Err(TransferError::auth_failed(format!(
                "Password authentication rejected for '{}'",
                endpoint.username
            )));
        }
        state.events.push("authenticated".to_string());
        drop(state);

        Ok(Connection {
            channel: Box::new(MemoryChannel {
                state: Arc::clone(&self.state),
                open: true,
            }),
            link: Box::new(MemoryLink {
                state: Arc::clone(&self.state),
                connected: true,
            }),
        })
    }
}

struct MemoryLink {
    state: Arc<Mutex<MemoryState>>,
    connected: bool,
}

impl SessionLink for MemoryLink {
    fn disconnect(&mut self) -> TransferResult<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        let mut state = lock(&self.state);
        state.events.push("session.disconnect".to_string());
        if state.faults.fail_disconnect {
            return Err(TransferError::connection_failed("Disconnect failed"));
        }
        Ok(())
    }
}

struct MemoryChannel {
    state: Arc<Mutex<MemoryState>>,
    open: bool,
}

impl MemoryChannel {
    fn state(&self) -> TransferResult<MutexGuard<'_, MemoryState>> {
        if !self.open {
            return Err(TransferError::remote_fs("SFTP channel is closed"));
        }
        Ok(lock(&self.state))
    }
}

impl FileChannel for MemoryChannel {
    fn realpath(&mut self, path: &str) -> TransferResult<String> {
        let state = self.state()?;
        let home = state.home.clone();
        Ok(paths::resolve(&home, path))
    }

    fn is_dir(&mut self, path: &str) -> TransferResult<bool> {
        Ok(self.state()?.dirs.contains(path))
    }

    fn mkdir(&mut self, path: &str) -> TransferResult<()> {
        let mut state = self.state()?;
        state.events.push(format!("mkdir {}", path));
        if state.faults.deny_mkdir {
            return Err(TransferError::remote_fs(format!("Permission denied: {}", path)));
        }
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(TransferError::remote_fs(format!("Failure: {} exists", path)));
        }
        if !state.dirs.contains(&parent_of(path)) {
            return Err(TransferError::remote_fs(format!("No such file: {}", parent_of(path))));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    fn open_read(&mut self, path: &str) -> TransferResult<Box<dyn Read + '_>> {
        let state = self.state()?;
        match state.files.get(path) {
            Some(contents) => Ok(Box::new(Cursor::new(contents.clone()))),
            None => Err(TransferError::remote_fs(format!("No such file: {}", path))),
        }
    }

    fn create(&mut self, path: &str) -> TransferResult<Box<dyn Write + '_>> {
        let mut state = self.state()?;
        if !state.dirs.contains(&parent_of(path)) {
            return Err(TransferError::remote_fs(format!("No such file: {}", parent_of(path))));
        }
        state.events.push(format!("create {}", path));
        state.files.insert(path.to_string(), Vec::new());
        let poisoned = state.faults.poisoned_writes.contains(base_name(path));
        drop(state);
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            path: path.to_string(),
            poisoned,
        }))
    }

    fn close(&mut self) -> TransferResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let mut state = lock(&self.state);
        state.events.push("channel.close".to_string());
        if state.faults.fail_channel_close {
            return Err(TransferError::remote_fs("Channel close failed"));
        }
        Ok(())
    }
}

struct MemoryWriter {
    state: Arc<Mutex<MemoryState>>,
    path: String,
    poisoned: bool,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.poisoned {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset mid-transfer"));
        }
        let mut state = lock(&self.state);
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#![expect(
    clippy::unwrap_used,
    reason = "Test utilities use .unwrap() for brevity"
)]

//! Shared test utilities for unit tests.

use crate::config::HOME_ENV;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Serializes tests that modify `DARTS_HUB_HOME`
static HOME_LOCK: Mutex<()> = Mutex::new(());

/// Create a temporary test directory that is removed on drop
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// RAII guard that points `DARTS_HUB_HOME` at a directory for one test
///
/// The lock is held for the guard's lifetime, so tests touching the variable
/// run one at a time; the previous value is restored on drop.
pub struct HomeGuard {
    original: Option<std::ffi::OsString>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[expect(
    unsafe_code,
    reason = "Test-only environment mutation, serialized by HOME_LOCK"
)]
impl HomeGuard {
    /// Set `DARTS_HUB_HOME` to `dir`
    pub fn new(dir: &TempDir) -> Self {
        let lock = HOME_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let original = std::env::var_os(HOME_ENV);
        // SAFETY: HOME_LOCK serializes every writer of this variable
        unsafe {
            std::env::set_var(HOME_ENV, dir.path());
        }
        Self {
            original,
            _lock: lock,
        }
    }
}

#[expect(
    unsafe_code,
    reason = "Test-only environment restore, serialized by HOME_LOCK"
)]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        // SAFETY: the lock is still held until this guard is gone
        unsafe {
            match &self.original {
                Some(original) => std::env::set_var(HOME_ENV, original),
                None => std::env::remove_var(HOME_ENV),
            }
        }
    }
}

/// Local HTTP/1.1 server answering fixed bodies by request path
///
/// Unknown paths get a 404. Every request is counted so tests can tell
/// whether a failure was retried. The accept thread lives until the test
/// binary exits.
pub struct TestServer {
    base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl TestServer {
    /// Serve `(path, status, body)` routes on an ephemeral localhost port
    pub fn start(routes: Vec<(&str, u16, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes: HashMap<String, (u16, Vec<u8>)> = routes
            .into_iter()
            .map(|(path, status, body)| (path.to_string(), (status, body)))
            .collect();
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let counter = Arc::clone(&hits);

        std::thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                answer(stream, &routes, &counter);
            }
        });
        Self { base, hits }
    }

    /// Absolute URL of `path`
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Number of requests received for `path`
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

fn answer(
    mut stream: TcpStream,
    routes: &HashMap<String, (u16, Vec<u8>)>,
    hits: &Mutex<HashMap<String, usize>>,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header == "\r\n" => break,
            Ok(_) => {}
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    *hits.lock().unwrap().entry(path.clone()).or_default() += 1;
    let (status, body) = routes
        .get(&path)
        .cloned()
        .unwrap_or((404, b"not found".to_vec()));

    let head = format!(
        "HTTP/1.1 {status} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

//! HTTP downloads with progress, timeouts and retry
//!
//! Uses the blocking `reqwest` client; callers run it on a background thread.
//! Timeouts are explicit so a request that never answers (`NetworkTimeout`) is
//! distinguishable from one that answered with a failure (`HttpStatus`).

use crate::download::cancel::CancellationToken;
use crate::download::retry::{RetryPolicy, retry};
use crate::error::{DartsHubError, Result};
use crate::events::EventBus;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Minimum byte delta between two progress reports
const PROGRESS_BYTES_STEP: u64 = 512 * 1024;

/// Read buffer size for streaming bodies
const CHUNK_SIZE: usize = 64 * 1024;

/// Timeouts for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed to establish a connection
    pub connect: Duration,
    /// Time allowed for the whole request including the body
    pub request: Duration,
}

impl Timeouts {
    /// Timeouts for artifact downloads
    pub fn download(secs: u64) -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(secs),
        }
    }

    /// Timeouts for small API requests
    pub fn api(secs: u64) -> Self {
        Self {
            connect: Duration::from_secs(secs.min(10)),
            request: Duration::from_secs(secs),
        }
    }
}

/// Decides when a progress report is due
#[derive(Debug, Default)]
struct ProgressThrottle {
    last_bytes: u64,
    last_percent: Option<u64>,
}

impl ProgressThrottle {
    fn due(&mut self, downloaded: u64, total: Option<u64>) -> bool {
        let percent = total.filter(|t| *t > 0).map(|t| downloaded * 100 / t);
        let due = match percent {
            Some(p) => self.last_percent != Some(p),
            None => downloaded - self.last_bytes >= PROGRESS_BYTES_STEP,
        };
        if due {
            self.last_bytes = downloaded;
            self.last_percent = percent;
        }
        due
    }
}

/// Blocking HTTP client with retry
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::blocking::Client,
    policy: RetryPolicy,
    bus: EventBus,
}

impl Downloader {
    /// Build a downloader with the given timeouts and retry policy
    pub fn new(timeouts: Timeouts, policy: RetryPolicy, bus: EventBus) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .user_agent(format!("darts-hub/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DartsHubError::ConfigError(Box::new(e)))?;
        Ok(Self {
            client,
            policy,
            bus,
        })
    }

    /// Download `url` to `dest`, reporting `(downloaded, total)` through `progress`
    ///
    /// The body is written to `<dest>.part` and renamed on completion, so a
    /// partial download never looks like a finished one. Returns the byte count.
    pub fn download<P>(
        &self,
        subject: &str,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        progress: P,
    ) -> Result<u64>
    where
        P: Fn(u64, Option<u64>),
    {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let partial = partial_path(dest);

        let bytes = retry(&self.policy, subject, &self.bus, cancel, |attempt| {
            debug!("{subject}: download attempt {attempt} from {url}");
            self.download_once(url, &partial, cancel, &progress)
        });

        match bytes {
            Ok(bytes) => {
                std::fs::rename(&partial, dest)?;
                info!("{subject}: downloaded {bytes} bytes to {}", dest.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    /// Fetch and deserialize a JSON document
    pub fn get_json<T: DeserializeOwned>(
        &self,
        subject: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        retry(&self.policy, subject, &self.bus, cancel, |_| {
            let response = self.send(self.client.get(url), url)?;
            response.json::<T>().map_err(|e| classify(url, e))
        })
    }

    fn download_once(
        &self,
        url: &str,
        partial: &Path,
        cancel: &CancellationToken,
        progress: &dyn Fn(u64, Option<u64>),
    ) -> Result<u64> {
        let mut response = self.send(self.client.get(url), url)?;
        let total = response.content_length();
        let mut file = File::create(partial)?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut downloaded = 0u64;
        let mut throttle = ProgressThrottle::default();

        progress(0, total);
        loop {
            if cancel.is_cancelled() {
                return Err(DartsHubError::Cancelled(url.to_string()));
            }
            let read = response.read(&mut buffer).map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    DartsHubError::NetworkTimeout {
                        url: url.to_string(),
                    }
                } else {
                    DartsHubError::NetworkInterrupted {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])?;
            downloaded += read as u64;
            if throttle.due(downloaded, total) {
                progress(downloaded, total);
            }
        }
        file.flush()?;
        progress(downloaded, total);
        Ok(downloaded)
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::blocking::Response> {
        let response = request.send().map_err(|e| classify(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DartsHubError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

/// Map a client error to the retry taxonomy
///
/// Only connection level failures stay transient; a request that cannot be
/// built or a body that cannot be decoded fails the same way on every attempt.
fn classify(url: &str, e: reqwest::Error) -> DartsHubError {
    if e.is_builder() || e.is_redirect() {
        DartsHubError::InvalidRequest {
            url: url.to_string(),
            source: e,
        }
    } else if e.is_decode() {
        DartsHubError::InvalidResponse {
            url: url.to_string(),
            source: e,
        }
    } else if e.is_timeout() {
        DartsHubError::NetworkTimeout {
            url: url.to_string(),
        }
    } else if let Some(status) = e.status() {
        DartsHubError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        DartsHubError::Network {
            url: url.to_string(),
            source: e,
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestServer;

    #[test]
    fn test_progress_throttle_by_percent() {
        let mut throttle = ProgressThrottle::default();
        assert!(throttle.due(0, Some(1000)));
        assert!(!throttle.due(5, Some(1000)));
        assert!(throttle.due(10, Some(1000)));
        assert!(!throttle.due(15, Some(1000)));
        assert!(throttle.due(1000, Some(1000)));
    }

    #[test]
    fn test_progress_throttle_by_bytes_without_total() {
        let mut throttle = ProgressThrottle::default();
        assert!(!throttle.due(1024, None));
        assert!(throttle.due(PROGRESS_BYTES_STEP, None));
        assert!(!throttle.due(PROGRESS_BYTES_STEP + 1, None));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/apps/darts-caller/darts-caller.zip")),
            PathBuf::from("/tmp/apps/darts-caller/darts-caller.zip.part")
        );
    }

    #[test]
    fn test_unreachable_host_is_transient_then_fails() {
        let bus = EventBus::new();
        let downloader = Downloader::new(
            Timeouts::api(2),
            RetryPolicy {
                max_attempts: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 1,
            },
            bus.clone(),
        )
        .unwrap();
        let rx = bus.subscribe();
        let dir = tempfile::tempdir().unwrap();

        // Port 9 on localhost (discard) is closed on CI machines
        let result = downloader.download(
            "darts-caller",
            "http://127.0.0.1:9/darts-caller.exe",
            &dir.path().join("darts-caller.exe"),
            &CancellationToken::new(),
            |_, _| {},
        );
        let error = result.unwrap_err();
        assert!(error.is_transient(), "unexpected error: {error}");
        assert!(!dir.path().join("darts-caller.exe").exists());
        assert!(!dir.path().join("darts-caller.exe.part").exists());

        let retries = rx
            .try_iter()
            .filter(|e| matches!(e, crate::events::HubEvent::RetryProgress { .. }))
            .count();
        assert_eq!(retries, 1);
    }

    fn quick_downloader(bus: &EventBus) -> Downloader {
        Downloader::new(
            Timeouts::api(2),
            RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 1,
            },
            bus.clone(),
        )
        .unwrap()
    }

    fn retry_count(rx: &std::sync::mpsc::Receiver<crate::events::HubEvent>) -> usize {
        rx.try_iter()
            .filter(|e| matches!(e, crate::events::HubEvent::RetryProgress { .. }))
            .count()
    }

    #[test]
    fn test_malformed_url_fails_without_retry() {
        let bus = EventBus::new();
        let downloader = quick_downloader(&bus);
        let rx = bus.subscribe();
        let dir = tempfile::tempdir().unwrap();

        let error = downloader
            .download(
                "darts-caller",
                "not a url",
                &dir.path().join("darts-caller.exe"),
                &CancellationToken::new(),
                |_, _| {},
            )
            .unwrap_err();
        assert!(!error.is_transient(), "unexpected error: {error}");
        assert!(matches!(error, DartsHubError::InvalidRequest { ref url, .. } if url == "not a url"));
        assert_eq!(retry_count(&rx), 0);
    }

    #[test]
    fn test_undecodable_json_fails_without_retry() {
        let server = TestServer::start(vec![("/releases/latest", 200, b"<html>".to_vec())]);
        let bus = EventBus::new();
        let downloader = quick_downloader(&bus);
        let rx = bus.subscribe();

        let error = downloader
            .get_json::<serde_json::Value>(
                "update",
                &server.url("/releases/latest"),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(error, DartsHubError::InvalidResponse { .. }), "unexpected error: {error}");
        assert!(!error.is_transient());
        assert_eq!(server.hits("/releases/latest"), 1);
        assert_eq!(retry_count(&rx), 0);
    }

    #[test]
    fn test_server_error_is_retried() {
        let server = TestServer::start(vec![("/darts-caller", 503, Vec::new())]);
        let bus = EventBus::new();
        let downloader = quick_downloader(&bus);
        let rx = bus.subscribe();
        let dir = tempfile::tempdir().unwrap();

        let error = downloader
            .download(
                "darts-caller",
                &server.url("/darts-caller"),
                &dir.path().join("darts-caller"),
                &CancellationToken::new(),
                |_, _| {},
            )
            .unwrap_err();
        assert!(matches!(error, DartsHubError::HttpStatus { status: 503, .. }));
        assert_eq!(server.hits("/darts-caller"), 3);
        assert_eq!(retry_count(&rx), 2);
    }
}

//! Downloading and unpacking
//!
//! Shared by downloadable apps, installers and the self-updater:
//! - `Downloader`: blocking HTTP with explicit timeouts and progress callbacks
//! - `retry`: bounded exponential backoff for transient failures
//! - `CancellationToken` / `CancellationSlot`: newer actions cancel older ones
//! - `extract`: zip/tar unpacking, executable bits for bare binaries

pub mod cancel;
pub mod downloader;
pub mod extract;
pub mod retry;

pub use cancel::{CancellationSlot, CancellationToken};
pub use downloader::{Downloader, Timeouts};
pub use extract::{ArtifactKind, unpack};
pub use retry::{RetryPolicy, retry};

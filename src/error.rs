//! Error types for darts-hub
//!
//! This module defines all error types used throughout the application,
//! providing clear error messages and proper error propagation.
//!
//! Every user-visible variant carries the identity of its subject (catalog file,
//! app name, URL or version) so a failure report is actionable on its own.

use thiserror::Error;

/// Simple error type for wrapping string messages while implementing `std::error::Error`
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

impl StringError {
    /// Create a new `StringError` from a string message
    pub fn new(msg: impl Into<String>) -> Box<Self> {
        Box::new(Self(msg.into()))
    }
}

/// Main error type for darts-hub
#[derive(Debug, Error)]
pub enum DartsHubError {
    /// A catalog file exists but could not be parsed
    #[error("Catalog file '{file}' could not be parsed: {source}")]
    CatalogParse {
        /// File name of the offending catalog
        file: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Two arguments of one configuration share a name
    #[error("Catalog file '{file}': app '{app}' declares argument '{argument}' more than once")]
    DuplicateArgument {
        /// File name of the offending catalog
        file: String,
        /// App whose configuration is invalid
        app: String,
        /// Duplicated argument name
        argument: String,
    },

    /// Two catalog entries share an app name
    #[error("Catalog file '{file}': app '{app}' is already defined")]
    DuplicateApp {
        /// File holding the second definition
        file: String,
        /// Duplicated app name
        app: String,
    },

    /// A profile references an app that no catalog file defines
    #[error("Profile '{profile}' references unknown app '{app}'")]
    UnknownProfileApp {
        /// Profile name
        profile: String,
        /// Missing app name
        app: String,
    },

    /// Argument type string could not be parsed
    #[error("Invalid argument type '{0}'")]
    InvalidArgumentType(String),

    /// No app with this name is loaded
    #[error("Unknown app: {0}")]
    UnknownApp(String),

    /// No profile with this name is loaded
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// A required profile entry cannot be removed from auto-start
    #[error("App '{app}' is required by profile '{profile}' and cannot be disabled")]
    RequiredApp {
        /// Profile name
        profile: String,
        /// App name
        app: String,
    },

    /// The app has nothing to run on this platform
    #[error("App '{app}' has no download for platform '{platform}'")]
    UnsupportedPlatform {
        /// App name
        app: String,
        /// Platform key, e.g. `linux-x64`
        platform: String,
    },

    /// The resolved executable does not exist
    #[error("App '{app}' has no executable at '{path}'")]
    ExecutableMissing {
        /// App name
        app: String,
        /// Path that was expected
        path: String,
    },

    /// Spawning a process failed
    #[error("Failed to start '{app}': {source}")]
    ProcessSpawn {
        /// App name
        app: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Terminating a process (tree) failed
    #[error("Failed to terminate '{subject}': {reason}")]
    ProcessKill {
        /// App name or pid
        subject: String,
        /// What went wrong
        reason: String,
    },

    /// A network request did not answer in time
    #[error("Request to {url} timed out")]
    NetworkTimeout {
        /// Requested URL
        url: String,
    },

    /// The server answered with an error status
    #[error("Request to {url} failed with HTTP status {status}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Transport level failure (DNS, connect, TLS, broken body)
    #[error("Network error for {url}: {source}")]
    Network {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The request could not be built or followed (malformed URL, redirect loop)
    #[error("Invalid request to {url}: {source}")]
    InvalidRequest {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a body that does not have the expected shape
    #[error("Unexpected response from {url}: {source}")]
    InvalidResponse {
        /// Requested URL
        url: String,
        /// Underlying decode error
        #[source]
        source: reqwest::Error,
    },

    /// The connection broke while the body was being read
    #[error("Download from {url} was interrupted: {source}")]
    NetworkInterrupted {
        /// Requested URL
        url: String,
        /// Underlying read error
        #[source]
        source: std::io::Error,
    },

    /// The operation was cancelled by a newer user action
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Unpacking a downloaded artifact failed
    #[error("Failed to extract '{path}': {reason}")]
    Extract {
        /// Artifact path
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Self-update failure
    #[error("Update to {version} failed: {reason}")]
    Update {
        /// Version that was being applied
        version: String,
        /// What went wrong
        reason: String,
    },

    /// Configuration error
    /// Preserves the underlying error source for full error chain transparency
    #[error("Configuration error: {0}")]
    ConfigError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Zip archive error
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DartsHubError {
    /// Whether retrying the same operation may succeed
    ///
    /// Timeouts, transport failures, 5xx and 429 responses are transient.
    /// Everything else (bad URL, undecodable body, 404, disk full,
    /// cancellation) is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkTimeout { .. } | Self::Network { .. } | Self::NetworkInterrupted { .. } => {
                true
            }
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether this error halts startup
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            Self::CatalogParse { .. }
                | Self::DuplicateArgument { .. }
                | Self::DuplicateApp { .. }
                | Self::UnknownProfileApp { .. }
        )
    }
}

/// Result type alias for darts-hub operations
pub type Result<T> = std::result::Result<T, DartsHubError>;

/// Convert an error to a user-friendly message
///
/// This function takes a `DartsHubError` and returns a message suitable
/// for displaying to end users in error dialogs.
pub fn get_user_friendly_error(error: &DartsHubError) -> String {
    match error {
        DartsHubError::CatalogParse { file, source } => format!(
            "The app catalog '{file}' is corrupted:\n\n{source}\n\n\
             darts-hub will not start until the file is fixed or removed.\n\
             Removing it restores the built-in defaults for that file."
        ),
        DartsHubError::DuplicateArgument {
            file,
            app,
            argument,
        } => format!(
            "The app catalog '{file}' is invalid:\n\n\
             App '{app}' defines the argument '{argument}' twice.\n\
             Remove one of the entries and restart darts-hub."
        ),
        DartsHubError::DuplicateApp { file, app } => format!(
            "The app catalog '{file}' is invalid:\n\n\
             An app named '{app}' is defined more than once.\n\
             Rename or remove one of the entries and restart darts-hub."
        ),
        DartsHubError::UnknownProfileApp { profile, app } => format!(
            "Profile '{profile}' uses the app '{app}', which no longer exists.\n\n\
             Edit profiles.json to remove the entry, or restore the app."
        ),
        DartsHubError::UnsupportedPlatform { app, platform } => {
            format!("'{app}' is not available for your system ({platform}).")
        }
        DartsHubError::ExecutableMissing { app, path } => format!(
            "'{app}' could not be found at:\n{path}\n\n\
             Please check the configured path or reinstall the app."
        ),
        DartsHubError::ProcessSpawn { app, source } => format!(
            "'{app}' could not be started:\n\n{source}\n\n\
             Please check file permissions and that the app is installed."
        ),
        DartsHubError::ProcessKill { subject, reason } => {
            format!("'{subject}' could not be stopped:\n\n{reason}")
        }
        DartsHubError::NetworkTimeout { url } => format!(
            "The server did not answer in time:\n{url}\n\n\
             Please check your internet connection and try again."
        ),
        DartsHubError::HttpStatus { url, status } => {
            format!("The download failed (HTTP {status}):\n{url}")
        }
        DartsHubError::Network { url, .. } => format!(
            "Could not reach:\n{url}\n\n\
             Please check your internet connection and firewall."
        ),
        DartsHubError::InvalidRequest { url, .. } => format!(
            "The address is not valid:\n{url}\n\n\
             Please check the URL configured for this app."
        ),
        DartsHubError::InvalidResponse { url, .. } => format!(
            "The server sent an unexpected answer:\n{url}\n\n\
             Please try again later."
        ),
        DartsHubError::Update { version, reason } => {
            format!("Updating darts-hub to {version} failed:\n\n{reason}")
        }
        DartsHubError::IoError(e) => {
            format!(
                "A file system error occurred:\n\n{e}\n\n\
                 Please check file permissions and disk space."
            )
        }
        other => other.to_string(),
    }
}

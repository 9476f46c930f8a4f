//! Error types for Stormlight runs

use thiserror::Error;

/// Result type alias for Stormlight operations
pub type Result<T> = std::result::Result<T, StormError>;

/// Errors that abort a load test run.
///
/// Per-request failures never surface here; they are counted by the
/// metrics registry and the virtual user keeps looping.
#[derive(Error, Debug)]
pub enum StormError {
    // === Configuration ===
    /// No request templates to choose from
    #[error("No endpoints defined: at least one request template is required")]
    EmptyTaskList,

    /// Spawn rate must be a positive, finite number of users per second
    #[error("Invalid spawn rate: {0} (must be > 0)")]
    InvalidSpawnRate(f64),

    /// Duration, timeout or interval that is zero or not finite
    #[error("Invalid {name}: {value}s (must be > 0)")]
    InvalidDuration { name: &'static str, value: f64 },

    /// Host is not an absolute http(s) URL
    #[error("Invalid host '{0}': expected an http:// or https:// URL")]
    InvalidHost(String),

    /// Method is not a valid HTTP method token
    #[error("Invalid HTTP method '{method}' for path {path}")]
    InvalidMethod { method: String, path: String },

    /// Header name or value that cannot be sent
    #[error("Invalid header '{name}' for path {path}")]
    InvalidHeader { name: String, path: String },

    // === Endpoint definition file ===
    /// Endpoint definition file does not exist
    #[error("Endpoint file not found: {0}")]
    ScriptNotFound(String),

    /// Endpoint definition file could not be parsed
    #[error("Failed to parse endpoint file {path}: {reason}")]
    ScriptParse { path: String, reason: String },

    // === Run faults ===
    /// HTTP session could not be opened for a virtual user
    #[error("Failed to open HTTP session: {0}")]
    Session(String),

    /// A virtual user task panicked or was cancelled
    #[error("Virtual user aborted: {0}")]
    UserAborted(String),

    /// Rendering a snapshot failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StormError {
    /// Whether the error was detected before the run started
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyTaskList
                | Self::InvalidSpawnRate(_)
                | Self::InvalidDuration { .. }
                | Self::InvalidHost(_)
                | Self::InvalidMethod { .. }
                | Self::InvalidHeader { .. }
                | Self::ScriptNotFound(_)
                | Self::ScriptParse { .. }
        )
    }
}

/// Failure of a single request, recovered inside the virtual user loop
#[derive(Error, Debug)]
pub enum RequestError {
    /// Connection, timeout or protocol failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Method token rejected by the HTTP layer
    #[error("invalid method: {0}")]
    Method(String),

    /// Failure reported by a non-reqwest session
    #[error("{0}")]
    Other(String),
}

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors produced by the workout ETL.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The movement pattern file is not valid YAML or has the wrong shape.
    #[error("Malformed pattern file {path}: {reason}")]
    PatternFile { path: PathBuf, reason: String },

    /// A movement pattern failed to compile.
    #[error("Invalid pattern {pattern:?} for movement {label:?}: {source}")]
    PatternCompile {
        label: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A raw post is missing a field the caller insisted on.
    #[error("Invalid input: {0}")]
    Input(String),

    /// No raw post files were found in the raw data directory.
    #[error("No raw post files found in {0}")]
    NoRawData(PathBuf),

    /// An oracle response failed schema or vocabulary checks.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An oracle response is missing a required key.
    #[error("Missing key {0}")]
    MissingKey(String),

    /// The oracle endpoint answered with an error status.
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The oracle request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials required for the oracle are not configured.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EtlError {
    /// Whether an oracle call that failed with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EtlError::Api { .. }
                | EtlError::Transport(_)
                | EtlError::MissingKey(_)
                | EtlError::JsonParse(_)
        )
    }

    /// `true` for HTTP 429 responses.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EtlError::Api { status: 429, .. })
    }

    /// Server-provided wait hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EtlError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Convenience alias used throughout the ETL crates.
pub type Result<T> = std::result::Result<T, EtlError>;

// src/error.rs

use thiserror::Error;

/// Exit status reserved for repository, marking and depsolve failures
pub const DNF_ERROR_EXIT_CODE: u8 = 10;

/// Core error types for depsolve
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a request
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request envelope is structurally wrong (unknown command, missing field)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Repository descriptor is malformed (missing or ambiguous metadata source)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Metadata could not be fetched
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Metadata could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Downloaded metadata does not match its advertised checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// A repository is unusable; the whole request aborts
    #[error("{reason}")]
    RepoError { repo: String, reason: String },

    /// One or more specs matched no package
    #[error("No match for argument: {}", .specs.join(", "))]
    MarkingError { specs: Vec<String> },

    /// Candidates exist but no consistent set satisfies every constraint
    #[error("{}", .problems.join("\n"))]
    DepsolveError {
        specs: Vec<String>,
        problems: Vec<String>,
    },
}

impl Error {
    /// Wrap any failure raised while loading a repository
    pub fn repo(repo: &str, cause: Error) -> Self {
        match cause {
            Error::RepoError { .. } => cause,
            other => Error::RepoError {
                repo: repo.to_string(),
                reason: format!("{}: {}", repo, other),
            },
        }
    }

    /// Error kind as written into the response envelope
    pub fn kind(&self) -> &'static str {
        match self {
            Error::RepoError { .. } => "RepoError",
            Error::MarkingError { .. } => "MarkingErrors",
            Error::DepsolveError { .. } => "DepsolveError",
            Error::ConfigError(_) => "ConfigurationError",
            Error::InvalidRequest(_) | Error::Json(_) => "InvalidRequest",
            Error::Io(_) => "IoError",
            Error::DownloadError(_) | Error::ChecksumMismatch { .. } => "DownloadError",
            Error::ParseError(_) => "ParseError",
        }
    }

    /// Human-readable reason as written into the response envelope
    pub fn reason(&self) -> String {
        match self {
            Error::RepoError { reason, .. } => {
                format!("Error occurred when setting up repo: {}", reason)
            }
            Error::MarkingError { .. } => format!(
                "Error occurred when marking packages for installation: {}",
                self
            ),
            Error::DepsolveError { specs, .. } => format!(
                "There was a problem depsolving {}: {}",
                quoted_list(specs),
                self
            ),
            other => other.to_string(),
        }
    }

    /// Whether this error belongs to the class reported with the reserved exit status
    pub fn is_dnf_error(&self) -> bool {
        matches!(
            self,
            Error::RepoError { .. } | Error::MarkingError { .. } | Error::DepsolveError { .. }
        )
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        if self.is_dnf_error() {
            DNF_ERROR_EXIT_CODE
        } else {
            1
        }
    }
}

/// Render specs as a bracketed quoted list: `['a', 'b']`
fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Result type alias using depsolve's Error type
pub type Result<T> = std::result::Result<T, Error>;

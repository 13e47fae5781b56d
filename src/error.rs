// Error model for the sync pipeline. Every remote step returns one of
// these; the binary turns them into a message and a non-zero exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Describes the conditions that can stop (or, for local files, thin out)
/// a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A credential or repository coordinate is missing. Raised before any
    /// network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// The branch, commit or tree named in a request does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the credential (401/403).
    #[error("authentication failed ({status}): {detail}")]
    Auth { status: u16, detail: String },

    /// The branch moved since it was read; the update was not a fast forward.
    #[error("branch `{branch}` has moved since it was read: {detail}")]
    Conflict { branch: String, detail: String },

    /// Any other non-success response.
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Transport failure. The reqwest error is the source, not part of the
    /// message, so `{:#}` chains print it once.
    #[error("network error")]
    Network(#[from] reqwest::Error),

    /// A local input file does not exist. Non-fatal: the pipeline reports it
    /// through the observer and moves on.
    #[error("local file missing: {}", .0.display())]
    LocalFileMissing(PathBuf),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Map an HTTP status plus response body to the matching variant.
    /// `what` names the object the request was about, for `NotFound`.
    pub fn from_status(status: u16, what: &str, detail: String) -> Self {
        match status {
            401 | 403 => SyncError::Auth { status, detail },
            404 => SyncError::NotFound(format!("{} ({})", what, detail)),
            _ => SyncError::Api { status, detail },
        }
    }
}

/// A specialized `Result` type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

// ⚠️ Error types shared by the directory client, the store and the engine
//
// Application edges (binaries, config loading) use anyhow; everything the
// engine has to branch on is a typed error here.

use thiserror::Error;

// ============================================================================
// DIRECTORY ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// 429, or 403 with a rate-limit reason
    #[error("folder service rate limit hit (status {status})")]
    RateLimited { status: u16 },

    /// 5xx from the folder service
    #[error("folder service error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// Connection refused, reset, timed out...
    #[error("folder service unreachable: {0}")]
    Transport(String),

    /// Any other non-success status; never retried
    #[error("folder service rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected folder service response: {0}")]
    Decode(String),

    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: Box<DirectoryError>,
    },
}

impl DirectoryError {
    /// Rate-limit and server-unavailable classes.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::RateLimited { .. }
                | DirectoryError::Server { .. }
                | DirectoryError::Transport(_)
        )
    }

    /// Classify a non-success HTTP response from the folder service.
    pub fn from_status(status: u16, body: &str) -> Self {
        let rate_limited = status == 429
            || (status == 403
                && (body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded")));

        if rate_limited {
            DirectoryError::RateLimited { status }
        } else if (500..600).contains(&status) {
            DirectoryError::Server {
                status,
                message: body.to_string(),
            }
        } else {
            DirectoryError::Rejected {
                status,
                message: body.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DirectoryError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            DirectoryError::from_status(status.as_u16(), &err.to_string())
        } else {
            DirectoryError::Transport(err.to_string())
        }
    }
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

// ============================================================================
// STORE ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("store connection lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// REQUEST VALIDATION
// ============================================================================

/// Every problem found in a request, reported together.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid request: {}", problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl ValidationError {
    pub fn single(problem: impl Into<String>) -> Self {
        ValidationError {
            problems: vec![problem.into()],
        }
    }
}

// ============================================================================
// PROVISIONING ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("yearly container '{0}' not found")]
    ContainerNotFound(String),

    #[error("accreditation folder route not found for project {0}")]
    RouteNotFound(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

//! Error types for ladder-tracker
//!
//! [`SourceError`] belongs to the data source collaborator. The scan engine
//! treats every variant the same way ("page fetch failed") and reports it as
//! [`ScanError::SourceUnavailable`].

use std::time::Duration;
use thiserror::Error;

/// Ladder data source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Authenticated mode requires an access token")]
    Unauthorized,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Terminal scan failures
///
/// "Not found" is not an error: a search that traverses the whole ladder
/// without a match ends with a regular outcome.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Page fetch failed; partial results stay usable
    #[error("Ladder source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// First page of a user-supplied league came back empty or failed
    #[error("League '{0}' not found or is empty")]
    LeagueNotFound(String),

    /// Stopped by the caller; the in-flight page was discarded
    #[error("Scan cancelled")]
    Cancelled,

    /// Search exceeded its wall-clock budget
    #[error("Search timed out after {elapsed:?} ({scanned} entries scanned)")]
    Timeout { elapsed: Duration, scanned: usize },

    /// Request cannot be served as configured
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

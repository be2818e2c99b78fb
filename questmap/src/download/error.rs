//! Download error types.

use thiserror::Error;

use super::record::RecordError;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors a download task or the coordinator can report.
///
/// Cancellation has its own variant so tasks can bail out with `?`, but the
/// coordinator never surfaces it as an error to progress listeners.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure (connect, TLS, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Server answered with an error status.
    #[error("server responded with {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body could not be understood.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The downloaded-tiles record could not be updated.
    #[error("failed to record downloaded tiles: {0}")]
    Record(#[from] RecordError),

    /// A download task panicked or was aborted by the runtime.
    #[error("download task '{name}' did not complete: {reason}")]
    Task { name: String, reason: String },

    /// The task observed its cancellation token.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Whether this error only signals cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => DownloadError::Server {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => DownloadError::Http(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(e: serde_json::Error) -> Self {
        DownloadError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_cancelled() {
        assert!(DownloadError::Cancelled.is_cancelled());
        assert!(!DownloadError::Http("reset".to_string()).is_cancelled());
    }

    #[test]
    fn test_server_error_display() {
        let err = DownloadError::Server {
            status: 509,
            message: "bandwidth limit exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server responded with 509: bandwidth limit exceeded"
        );
    }

    #[test]
    fn test_parse_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DownloadError = json_err.into();
        assert!(matches!(err, DownloadError::Parse(_)));
    }
}

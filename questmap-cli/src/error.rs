//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::process;

use questmap::config::ConfigFileError;
use questmap::download::{DownloadError, RecordError, ServiceError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Config file could not be read or written
    ConfigFile(ConfigFileError),
    /// Invalid command line arguments
    InvalidArgs(String),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Download record could not be opened or updated
    Record(RecordError),
    /// Download service stopped unexpectedly
    Service(ServiceError),
    /// The download failed
    Download(String),
    /// Ctrl+C handler could not be installed
    SignalHandler(ctrlc::Error),
}

impl CliError {
    /// Exit the process with an error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::ConfigFile(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!("Fix the value in the config file or regenerate it with:");
            eprintln!("  questmap config init --force");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Record(e) => write!(f, "Download record error: {}", e),
            CliError::Service(e) => write!(f, "Download service error: {}", e),
            CliError::Download(msg) => write!(f, "Download failed: {}", msg),
            CliError::SignalHandler(e) => write!(f, "Failed to set signal handler: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Record(e) => Some(e),
            CliError::Service(e) => Some(e),
            CliError::SignalHandler(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<RecordError> for CliError {
    fn from(e: RecordError) -> Self {
        CliError::Record(e)
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl From<ctrlc::Error> for CliError {
    fn from(e: ctrlc::Error) -> Self {
        CliError::SignalHandler(e)
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CliError::InvalidArgs("left > right".into()).to_string(),
            "Invalid arguments: left > right"
        );
        assert_eq!(
            CliError::from(DownloadError::Cancelled).to_string(),
            "Download failed: download cancelled"
        );
    }

    #[test]
    fn test_signal_handler_error() {
        let err = CliError::from(ctrlc::Error::MultipleHandlers);
        assert!(matches!(err, CliError::SignalHandler(_)));
        assert!(err.to_string().starts_with("Failed to set signal handler"));
    }
}

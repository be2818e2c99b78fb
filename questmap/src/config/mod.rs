//! User configuration stored in `~/.questmap/config.ini`.
//!
//! # Example
//!
//! ```no_run
//! use questmap::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let coordinator_config = config.coordinator_config();
//! # Ok::<(), questmap::config::ConfigFileError>(())
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, DownloadSettings, LoggingSettings, TeamModeSettings, DEFAULT_LOG_FILE,
};

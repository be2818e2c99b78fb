//! Terminal progress display for downloads.

use std::sync::mpsc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use questmap::download::{DownloadError, DownloadProgressListener};

/// How a download request ended, as seen by the progress listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded,
    Failed(String),
    Cancelled,
}

/// Spinner driven by coordinator callbacks.
///
/// Sends one [`Completion`] per request on `on_finished`.
pub struct CliProgress {
    spinner: ProgressBar,
    failure: Mutex<Option<String>>,
    succeeded: Mutex<bool>,
    finished: Mutex<mpsc::Sender<Completion>>,
}

impl CliProgress {
    pub fn new(finished: mpsc::Sender<Completion>) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self {
            spinner,
            failure: Mutex::new(None),
            succeeded: Mutex::new(false),
            finished: Mutex::new(finished),
        }
    }
}

impl DownloadProgressListener for CliProgress {
    fn on_started(&self) {
        *self.failure.lock() = None;
        *self.succeeded.lock() = false;
        self.spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner.set_message("Downloading...");
    }

    fn on_success(&self) {
        *self.succeeded.lock() = true;
        self.spinner
            .finish_with_message(format!("{}", style("Download complete").green()));
    }

    fn on_error(&self, error: &DownloadError) {
        *self.failure.lock() = Some(error.to_string());
        self.spinner
            .abandon_with_message(format!("{} {}", style("Download failed:").red(), error));
    }

    fn on_finished(&self) {
        let completion = match (self.failure.lock().take(), *self.succeeded.lock()) {
            (Some(reason), _) => Completion::Failed(reason),
            (None, true) => Completion::Succeeded,
            (None, false) => {
                self.spinner
                    .abandon_with_message(format!("{}", style("Download cancelled").yellow()));
                Completion::Cancelled
            }
        };
        // The receiver is gone only if the command already returned
        let _ = self.finished.lock().send(completion);
    }
}

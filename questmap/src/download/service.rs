//! Long-running download service with a request/cancel command surface.
//!
//! The service owns a [`TileDownloadCoordinator`] and drives it from a
//! command channel on a self-driving tokio task. Callers only hold a cheap
//! [`DownloadHandle`]; results come back through the coordinator's progress
//! listener, never as return values.
//!
//! # Example
//!
//! ```ignore
//! let handle = DownloadService::start(coordinator, &tokio::runtime::Handle::current());
//!
//! handle.set_progress_listener(Some(listener));
//! handle.request(tiles, true)?;
//!
//! // The user panned away
//! handle.cancel()?;
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::coordinator::{DownloadOutcome, TileDownloadCoordinator};
use super::progress::DownloadProgressListener;
use crate::coord::TileRect;

/// Commands accepted by the download service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadCommand {
    /// Download `tiles`, superseding whatever is in flight.
    Start { tiles: TileRect, priority: bool },
    /// Cancel the download in flight.
    Cancel,
}

/// Errors from the download handle.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service loop has stopped.
    #[error("download service is not running")]
    NotRunning,
}

/// Handle to a running download service.
///
/// Lightweight and cheap to clone.
#[derive(Clone)]
pub struct DownloadHandle {
    commands: mpsc::UnboundedSender<DownloadCommand>,
    coordinator: Arc<TileDownloadCoordinator>,
    shutdown: CancellationToken,
}

impl DownloadHandle {
    /// Request a download of `tiles`.
    pub fn request(&self, tiles: TileRect, priority: bool) -> Result<(), ServiceError> {
        self.send(DownloadCommand::Start { tiles, priority })
    }

    /// Cancel the current download, if any.
    pub fn cancel(&self) -> Result<(), ServiceError> {
        self.send(DownloadCommand::Cancel)
    }

    pub fn is_download_in_progress(&self) -> bool {
        self.coordinator.is_download_in_progress()
    }

    pub fn is_priority_download_in_progress(&self) -> bool {
        self.coordinator.is_priority_download_in_progress()
    }

    pub fn set_progress_listener(&self, listener: Option<Arc<dyn DownloadProgressListener>>) {
        self.coordinator.set_progress_listener(listener);
    }

    /// Stop the service, cancelling any download in flight.
    pub fn shutdown(&self) {
        info!("Download service shutdown requested");
        self.shutdown.cancel();
    }

    /// Whether the service loop is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.commands.is_closed()
    }

    fn send(&self, command: DownloadCommand) -> Result<(), ServiceError> {
        if self.shutdown.is_cancelled() {
            return Err(ServiceError::NotRunning);
        }
        self.commands
            .send(command)
            .map_err(|_| ServiceError::NotRunning)
    }
}

/// Download service entry point.
pub struct DownloadService {
    coordinator: Arc<TileDownloadCoordinator>,
    commands: mpsc::UnboundedReceiver<DownloadCommand>,
    shutdown: CancellationToken,
}

impl DownloadService {
    /// Start the service on `runtime` and return a handle to it.
    pub fn start(coordinator: Arc<TileDownloadCoordinator>, runtime: &Handle) -> DownloadHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let handle = DownloadHandle {
            commands: tx,
            coordinator: Arc::clone(&coordinator),
            shutdown: shutdown.clone(),
        };

        let service = Self {
            coordinator,
            commands: rx,
            shutdown,
        };
        runtime.spawn(service.run());

        handle
    }

    /// Main loop.
    ///
    /// Requests in flight are polled before the next command is read, so each
    /// request has made itself current before a later one can supersede it.
    async fn run(mut self) {
        info!("Download service started");

        let mut in_flight: FuturesUnordered<BoxFuture<'static, DownloadOutcome>> =
            FuturesUnordered::new();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    debug!(?outcome, "Download request resolved");
                }

                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        DownloadCommand::Start { tiles, priority } => {
                            debug!(tiles = %tiles, priority, "Download requested");
                            let coordinator = Arc::clone(&self.coordinator);
                            in_flight.push(Box::pin(async move {
                                coordinator.request_download(tiles, priority).await
                            }));
                        }
                        DownloadCommand::Cancel => {
                            self.coordinator.cancel_download();
                        }
                    }
                }
            }
        }

        // Let requests in flight observe cancellation and deliver on_finished
        self.coordinator.cancel_download();
        while let Some(outcome) = in_flight.next().await {
            debug!(?outcome, "Download request resolved during shutdown");
        }

        info!("Download service stopped");
    }
}

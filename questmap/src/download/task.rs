//! The download task abstraction.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use crate::coord::BoundingBox;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One data domain's fetch work (map data, notes, ...).
///
/// The coordinator runs every registered task concurrently against the same
/// bounding box and hands all of them the same cancellation token. Tasks own
/// disjoint stores, so they do not coordinate with each other.
///
/// # Cancellation
///
/// Cancellation is cooperative. A task should check the token at its own
/// granularity and return `Err(DownloadError::Cancelled)` (or `Ok(())`) once
/// it observes it; the coordinator never forcibly interrupts a task.
///
/// # Dyn Compatibility
///
/// Uses `Pin<Box<dyn Future>>` so tasks can be held as `Arc<dyn DownloadTask>`.
pub trait DownloadTask: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch this task's data for `bbox` and write it to the task's store.
    fn download(
        &self,
        bbox: BoundingBox,
        cancellation: CancellationToken,
    ) -> BoxFuture<'_, Result<(), DownloadError>>;
}

//! Progress notifications for tile downloads.

use super::error::DownloadError;

/// Observer for the lifecycle of a download request.
///
/// For every request that actually starts downloading:
///
/// - `on_started` fires once, first
/// - then at most one of `on_success` / `on_error` (neither if cancelled)
/// - `on_finished` fires last, exactly once
///
/// Requests answered from the freshness record produce no callbacks.
/// Coordinator state (`is_download_in_progress` etc.) is already reset when
/// the completion callbacks run.
pub trait DownloadProgressListener: Send + Sync {
    fn on_started(&self) {}

    fn on_success(&self) {}

    fn on_error(&self, error: &DownloadError) {
        let _ = error;
    }

    fn on_finished(&self) {}
}

//! Tile download coordinator.
//!
//! Owns the lifecycle of "download this tile rect" requests:
//!
//! - **Freshness**: rects downloaded within the freshness window are skipped
//! - **Supersession**: a new request cancels the one in flight (last request
//!   wins, nothing is queued)
//! - **Fan-out**: all download tasks run concurrently with one shared token
//! - **Notification**: progress is reported to an optional listener
//!
//! # Request lifecycle
//!
//! ```text
//! request_download(rect)
//!     │
//!     ├── fresh? ──yes──► return AlreadyFresh (no callbacks)
//!     │
//!     ├── cancel previous token, install new one
//!     ├── flags = downloading, on_started()
//!     ├── spawn every DownloadTask ──► wait for all
//!     ├── success and not cancelled? ──► record rect as fresh
//!     ├── flags reset (only if still the current request)
//!     └── on_success() / on_error(e) / nothing on cancel, then on_finished()
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::CoordinatorConfig;
use super::error::DownloadError;
use super::progress::DownloadProgressListener;
use super::record::{DownloadKind, DownloadedTilesStore};
use super::task::DownloadTask;
use crate::coord::{BoundingBox, TileRect};

/// How a single `request_download` call ended.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The rect was downloaded within the freshness window; nothing was done.
    AlreadyFresh,
    /// Every task succeeded and the rect was recorded as fresh.
    Completed,
    /// A task (or recording the result) failed.
    Failed(DownloadError),
    /// The request was cancelled explicitly or superseded by a newer one.
    Cancelled,
}

impl DownloadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DownloadOutcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadOutcome::Cancelled)
    }
}

/// Result of running the task batch, before recording.
enum BatchResult {
    Success,
    Failed(DownloadError),
    Cancelled,
}

/// The download currently considered "current".
#[derive(Debug)]
struct ActiveDownload {
    id: u64,
    cancellation: CancellationToken,
}

/// Coordinates tile rect downloads across all registered download tasks.
///
/// Thread-safe; share it as `Arc<TileDownloadCoordinator>`. The state
/// queries never block on a running download.
pub struct TileDownloadCoordinator {
    config: CoordinatorConfig,
    downloaders: Vec<Arc<dyn DownloadTask>>,
    downloaded_tiles: Arc<dyn DownloadedTilesStore>,
    progress_listener: RwLock<Option<Arc<dyn DownloadProgressListener>>>,
    current: Mutex<Option<ActiveDownload>>,
    next_id: AtomicU64,
    is_downloading: AtomicBool,
    is_priority_download: AtomicBool,
}

impl std::fmt::Debug for TileDownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.downloaders.iter().map(|d| d.name()).collect();
        f.debug_struct("TileDownloadCoordinator")
            .field("config", &self.config)
            .field("downloaders", &names)
            .field("has_progress_listener", &self.progress_listener.read().is_some())
            .field("is_downloading", &self.is_download_in_progress())
            .field("is_priority_download", &self.is_priority_download_in_progress())
            .finish()
    }
}

impl TileDownloadCoordinator {
    /// Create a coordinator.
    ///
    /// # Arguments
    ///
    /// * `config` - Tile zoom and freshness window
    /// * `downloaders` - Tasks run for every download, one per data domain
    /// * `downloaded_tiles` - Freshness record owned by this coordinator
    pub fn new(
        config: CoordinatorConfig,
        downloaders: Vec<Arc<dyn DownloadTask>>,
        downloaded_tiles: Arc<dyn DownloadedTilesStore>,
    ) -> Self {
        Self {
            config,
            downloaders,
            downloaded_tiles,
            progress_listener: RwLock::new(None),
            current: Mutex::new(None),
            next_id: AtomicU64::new(0),
            is_downloading: AtomicBool::new(false),
            is_priority_download: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Replace (or clear) the progress listener.
    pub fn set_progress_listener(&self, listener: Option<Arc<dyn DownloadProgressListener>>) {
        *self.progress_listener.write() = listener;
    }

    /// Whether a download is running.
    pub fn is_download_in_progress(&self) -> bool {
        self.is_downloading.load(Ordering::SeqCst)
    }

    /// Whether the running download was requested with priority (by the user).
    pub fn is_priority_download_in_progress(&self) -> bool {
        self.is_priority_download.load(Ordering::SeqCst)
    }

    /// Whether `tiles` were fully downloaded within the freshness window.
    pub fn has_downloaded_already(&self, tiles: &TileRect) -> bool {
        self.downloaded_tiles
            .get(self.config.tile_zoom, tiles, self.freshness_cutoff())
            .contains(&DownloadKind::All)
    }

    /// Download everything in `tiles`, unless it is still fresh.
    ///
    /// Cancels any download in flight before starting. Resolves when every
    /// task has finished; run it on a background task to avoid waiting.
    /// Must be called within a Tokio runtime (tasks are spawned onto it).
    pub async fn request_download(&self, tiles: TileRect, priority: bool) -> DownloadOutcome {
        let bbox = tiles.as_bounding_box(self.config.tile_zoom);

        if self.has_downloaded_already(&tiles) {
            info!(bbox = %bbox, "Not downloading, data still fresh");
            return DownloadOutcome::AlreadyFresh;
        }

        let (id, cancellation) = self.begin(priority);
        self.notify(|l| l.on_started());

        info!(bbox = %bbox, priority, id, "Starting download");
        let started = Instant::now();

        let batch = self.run_downloaders(bbox, &cancellation).await;

        let outcome = if cancellation.is_cancelled() {
            DownloadOutcome::Cancelled
        } else {
            match batch {
                BatchResult::Cancelled => DownloadOutcome::Cancelled,
                BatchResult::Failed(e) => DownloadOutcome::Failed(e),
                BatchResult::Success => match self.downloaded_tiles.put(
                    self.config.tile_zoom,
                    &tiles,
                    DownloadKind::All,
                ) {
                    Ok(()) => DownloadOutcome::Completed,
                    Err(e) => {
                        error!(error = %e, "Unable to record downloaded tiles");
                        DownloadOutcome::Failed(e.into())
                    }
                },
            }
        };

        // Flags must be reset before invoking the completion callbacks
        self.end(id);

        match &outcome {
            DownloadOutcome::Completed => self.notify(|l| l.on_success()),
            DownloadOutcome::Failed(e) => self.notify(|l| l.on_error(e)),
            DownloadOutcome::Cancelled => info!(bbox = %bbox, id, "Download cancelled"),
            DownloadOutcome::AlreadyFresh => {}
        }
        self.notify(|l| l.on_finished());

        info!(
            bbox = %bbox,
            id,
            seconds = %format!("{:.1}", started.elapsed().as_secs_f64()),
            "Finished download"
        );

        outcome
    }

    /// Cancel whatever download is in flight. No-op if none is.
    pub fn cancel_download(&self) {
        let current = self.current.lock();
        if let Some(active) = current.as_ref() {
            if !active.cancellation.is_cancelled() {
                info!(id = active.id, "Cancelling download");
                active.cancellation.cancel();
            }
        }
    }

    /// Oldest timestamp that still counts as fresh.
    fn freshness_cutoff(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.refresh_data_after)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .map_or(DateTime::<Utc>::UNIX_EPOCH, |cutoff| cutoff.max(DateTime::<Utc>::UNIX_EPOCH))
    }

    /// Supersede the current download and make a new one current.
    fn begin(&self, priority: bool) -> (u64, CancellationToken) {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            debug!(id = previous.id, "Superseding previous download");
            previous.cancellation.cancel();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancellation = CancellationToken::new();
        *current = Some(ActiveDownload {
            id,
            cancellation: cancellation.clone(),
        });

        self.is_priority_download.store(priority, Ordering::SeqCst);
        self.is_downloading.store(true, Ordering::SeqCst);

        (id, cancellation)
    }

    /// Clear state if download `id` is still the current one.
    ///
    /// A superseded download leaves the flags to its successor.
    fn end(&self, id: u64) {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|active| active.id == id) {
            *current = None;
            self.is_priority_download.store(false, Ordering::SeqCst);
            self.is_downloading.store(false, Ordering::SeqCst);
        }
    }

    /// Run every task concurrently and wait for all of them.
    ///
    /// The first real error cancels the remaining tasks (cooperatively) and is
    /// the only one reported.
    async fn run_downloaders(
        &self,
        bbox: BoundingBox,
        cancellation: &CancellationToken,
    ) -> BatchResult {
        let batch = cancellation.child_token();
        // Tasks are detached once spawned; stop them if this future is dropped.
        let _guard = batch.clone().drop_guard();

        let mut pending: FuturesUnordered<_> = self
            .downloaders
            .iter()
            .map(|task| {
                let task = Arc::clone(task);
                let name = task.name().to_string();
                let token = batch.clone();
                let handle = tokio::spawn(async move { task.download(bbox, token).await });
                async move { (name, handle.await) }
            })
            .collect();

        let mut first_error: Option<DownloadError> = None;
        let mut saw_cancellation = false;

        while let Some((name, joined)) = pending.next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(DownloadError::Task {
                    name: name.clone(),
                    reason: e.to_string(),
                })
            });

            match result {
                Ok(()) => debug!(downloader = %name, "Downloader finished"),
                Err(e) if e.is_cancelled() => {
                    debug!(downloader = %name, "Downloader observed cancellation");
                    saw_cancellation = true;
                }
                Err(e) if first_error.is_some() => {
                    debug!(downloader = %name, error = %e, "Further downloader error ignored");
                }
                Err(e) => {
                    error!(downloader = %name, error = %e, "Unable to download");
                    batch.cancel();
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => BatchResult::Failed(e),
            None if saw_cancellation => BatchResult::Cancelled,
            None => BatchResult::Success,
        }
    }

    fn notify(&self, f: impl FnOnce(&dyn DownloadProgressListener)) {
        let listener = self.progress_listener.read().clone();
        if let Some(listener) = listener {
            f(listener.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::record::MemoryDownloadedTiles;
    use crate::download::task::BoxFuture;
    use std::sync::atomic::AtomicUsize;
    use std::sync::OnceLock;
    use std::time::Duration;
    use tokio::sync::Notify;

    // ─────────────────────────────────────────────────────────────────────────
    // Test doubles
    // ─────────────────────────────────────────────────────────────────────────

    /// Succeeds immediately, counting calls.
    #[derive(Default)]
    struct InstantTask {
        calls: AtomicUsize,
    }

    impl DownloadTask for InstantTask {
        fn name(&self) -> &str {
            "instant"
        }

        fn download(
            &self,
            _bbox: BoundingBox,
            _cancellation: CancellationToken,
        ) -> BoxFuture<'_, Result<(), DownloadError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    /// Fails immediately.
    struct FailingTask;

    impl DownloadTask for FailingTask {
        fn name(&self) -> &str {
            "failing"
        }

        fn download(
            &self,
            _bbox: BoundingBox,
            _cancellation: CancellationToken,
        ) -> BoxFuture<'_, Result<(), DownloadError>> {
            Box::pin(async {
                Err(DownloadError::Server {
                    status: 500,
                    message: "boom".to_string(),
                })
            })
        }
    }

    /// Runs until cancelled.
    #[derive(Default)]
    struct BlockingTask {
        observed_cancel: AtomicUsize,
    }

    impl DownloadTask for BlockingTask {
        fn name(&self) -> &str {
            "blocking"
        }

        fn download(
            &self,
            _bbox: BoundingBox,
            cancellation: CancellationToken,
        ) -> BoxFuture<'_, Result<(), DownloadError>> {
            Box::pin(async move {
                cancellation.cancelled().await;
                self.observed_cancel.fetch_add(1, Ordering::SeqCst);
                Err(DownloadError::Cancelled)
            })
        }
    }

    /// First call blocks until cancelled; later calls wait for `release`.
    #[derive(Default)]
    struct GatedTask {
        calls: AtomicUsize,
        release: Notify,
    }

    impl DownloadTask for GatedTask {
        fn name(&self) -> &str {
            "gated"
        }

        fn download(
            &self,
            _bbox: BoundingBox,
            cancellation: CancellationToken,
        ) -> BoxFuture<'_, Result<(), DownloadError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call == 0 {
                    cancellation.cancelled().await;
                    return Err(DownloadError::Cancelled);
                }
                tokio::select! {
                    _ = cancellation.cancelled() => Err(DownloadError::Cancelled),
                    _ = self.release.notified() => Ok(()),
                }
            })
        }
    }

    /// Records callbacks and the coordinator state seen from inside them.
    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
        coordinator: OnceLock<Arc<TileDownloadCoordinator>>,
        downloading_seen_on_finish: Mutex<Vec<bool>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }

        fn count(&self, event: &str) -> usize {
            self.events().iter().filter(|e| e.as_str() == event).count()
        }
    }

    impl DownloadProgressListener for RecordingListener {
        fn on_started(&self) {
            self.events.lock().push("started".to_string());
        }

        fn on_success(&self) {
            self.events.lock().push("success".to_string());
        }

        fn on_error(&self, _error: &DownloadError) {
            self.events.lock().push("error".to_string());
        }

        fn on_finished(&self) {
            if let Some(coordinator) = self.coordinator.get() {
                self.downloading_seen_on_finish
                    .lock()
                    .push(coordinator.is_download_in_progress());
            }
            self.events.lock().push("finished".to_string());
        }
    }

    const ZOOM: u8 = crate::download::config::DEFAULT_DOWNLOAD_TILE_ZOOM;

    fn rect(x: u32) -> TileRect {
        TileRect::new(x, 100, x + 1, 101).unwrap()
    }

    fn coordinator_with(
        downloaders: Vec<Arc<dyn DownloadTask>>,
    ) -> (
        Arc<TileDownloadCoordinator>,
        Arc<MemoryDownloadedTiles>,
        Arc<RecordingListener>,
    ) {
        let record = Arc::new(MemoryDownloadedTiles::new());
        let coordinator = Arc::new(TileDownloadCoordinator::new(
            CoordinatorConfig::default(),
            downloaders,
            record.clone(),
        ));
        let listener = Arc::new(RecordingListener::default());
        let _ = listener.coordinator.set(Arc::clone(&coordinator));
        coordinator.set_progress_listener(Some(listener.clone()));
        (coordinator, record, listener)
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_second_request_for_fresh_rect_is_noop() {
        let task = Arc::new(InstantTask::default());
        let (coordinator, _, listener) = coordinator_with(vec![task.clone()]);

        let first = coordinator.request_download(rect(10), false).await;
        let second = coordinator.request_download(rect(10), false).await;

        assert!(first.is_completed());
        assert!(matches!(second, DownloadOutcome::AlreadyFresh));
        assert_eq!(task.calls.load(Ordering::SeqCst), 1);
        assert_eq!(listener.events(), vec!["started", "success", "finished"]);
    }

    #[tokio::test]
    async fn test_all_downloaders_run() {
        let a = Arc::new(InstantTask::default());
        let b = Arc::new(InstantTask::default());
        let (coordinator, record, _) = coordinator_with(vec![a.clone(), b.clone()]);

        let outcome = coordinator.request_download(rect(20), true).await;

        assert!(outcome.is_completed());
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert!(record
            .get(ZOOM, &rect(20), Utc::now() - chrono::Duration::minutes(1))
            .contains(&DownloadKind::All));
    }

    #[tokio::test]
    async fn test_flags_reset_before_completion_callbacks() {
        let (coordinator, _, listener) = coordinator_with(vec![Arc::new(InstantTask::default())]);

        coordinator.request_download(rect(30), true).await;

        assert_eq!(*listener.downloading_seen_on_finish.lock(), vec![false]);
        assert!(!coordinator.is_download_in_progress());
        assert!(!coordinator.is_priority_download_in_progress());
    }

    #[tokio::test]
    async fn test_failure_reported_once_and_not_recorded() {
        let blocking = Arc::new(BlockingTask::default());
        let (coordinator, record, listener) =
            coordinator_with(vec![Arc::new(FailingTask), blocking.clone(), Arc::new(FailingTask)]);

        let outcome = coordinator.request_download(rect(40), false).await;

        assert!(matches!(
            outcome,
            DownloadOutcome::Failed(DownloadError::Server { status: 500, .. })
        ));
        assert_eq!(listener.events(), vec!["started", "error", "finished"]);
        assert_eq!(blocking.observed_cancel.load(Ordering::SeqCst), 1);
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_cancel_yields_only_finished() {
        let (coordinator, record, listener) =
            coordinator_with(vec![Arc::new(BlockingTask::default())]);

        let running = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.request_download(rect(50), false).await })
        };
        wait_until(|| coordinator.is_download_in_progress()).await;

        coordinator.cancel_download();
        let outcome = running.await.unwrap();

        assert!(outcome.is_cancelled());
        assert_eq!(listener.count("success"), 0);
        assert_eq!(listener.count("error"), 0);
        assert_eq!(listener.count("finished"), 1);
        assert!(record.is_empty());
        assert!(!coordinator.is_download_in_progress());
    }

    #[tokio::test]
    async fn test_cancel_without_download_is_noop() {
        let (coordinator, _, listener) = coordinator_with(vec![Arc::new(InstantTask::default())]);
        coordinator.cancel_download();
        coordinator.cancel_download();
        assert!(listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_new_request_supersedes_running_one() {
        let task = Arc::new(GatedTask::default());
        let (coordinator, record, listener) = coordinator_with(vec![task.clone()]);

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.request_download(rect(60), false).await })
        };
        wait_until(|| task.calls.load(Ordering::SeqCst) == 1).await;

        task.release.notify_one();
        let second = coordinator.request_download(rect(70), true).await;
        let first = first.await.unwrap();

        assert!(first.is_cancelled());
        assert!(second.is_completed());
        assert_eq!(listener.count("started"), 2);
        assert_eq!(listener.count("success"), 1);
        assert_eq!(listener.count("error"), 0);
        assert_eq!(listener.count("finished"), 2);

        let since = Utc::now() - chrono::Duration::minutes(1);
        assert!(record.get(ZOOM, &rect(60), since).is_empty());
        assert!(record.get(ZOOM, &rect(70), since).contains(&DownloadKind::All));
        assert!(!coordinator.is_download_in_progress());
    }

    #[tokio::test]
    async fn test_superseded_download_leaves_successor_flags() {
        let task = Arc::new(GatedTask::default());
        let (coordinator, _, _) = coordinator_with(vec![task.clone()]);

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.request_download(rect(80), false).await })
        };
        wait_until(|| task.calls.load(Ordering::SeqCst) == 1).await;

        let second = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.request_download(rect(90), true).await })
        };

        assert!(first.await.unwrap().is_cancelled());
        wait_until(|| task.calls.load(Ordering::SeqCst) == 2).await;
        assert!(coordinator.is_download_in_progress());
        assert!(coordinator.is_priority_download_in_progress());

        task.release.notify_one();
        assert!(second.await.unwrap().is_completed());
        assert!(!coordinator.is_download_in_progress());
        assert!(!coordinator.is_priority_download_in_progress());
    }

    #[tokio::test]
    async fn test_stale_record_triggers_download() {
        let task = Arc::new(InstantTask::default());
        let (coordinator, record, _) = coordinator_with(vec![task.clone()]);
        record
            .put_at(
                ZOOM,
                &rect(100),
                DownloadKind::All,
                Utc::now() - chrono::Duration::hours(13),
            )
            .unwrap();

        let outcome = coordinator.request_download(rect(100), false).await;

        assert!(outcome.is_completed());
        assert_eq!(task.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_freshness_is_per_zoom() {
        let record = Arc::new(MemoryDownloadedTiles::new());
        let coarse_task = Arc::new(InstantTask::default());
        let fine_task = Arc::new(InstantTask::default());
        let coarse = TileDownloadCoordinator::new(
            CoordinatorConfig::default().with_tile_zoom(10),
            vec![coarse_task.clone()],
            record.clone(),
        );
        let fine = TileDownloadCoordinator::new(
            CoordinatorConfig::default().with_tile_zoom(16),
            vec![fine_task.clone()],
            record.clone(),
        );
        let tiles = TileRect::new(100, 100, 100, 100).unwrap();

        assert!(coarse.request_download(tiles, false).await.is_completed());
        assert!(!fine.has_downloaded_already(&tiles));
        assert!(fine.request_download(tiles, false).await.is_completed());

        assert_eq!(coarse_task.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fine_task.calls.load(Ordering::SeqCst), 1);
        assert!(coarse.has_downloaded_already(&tiles));
    }

    #[test]
    fn test_cutoff_never_before_epoch() {
        let coordinator = TileDownloadCoordinator::new(
            CoordinatorConfig::default().with_refresh_data_after(Duration::from_secs(u64::MAX)),
            vec![],
            Arc::new(MemoryDownloadedTiles::new()),
        );
        assert_eq!(coordinator.freshness_cutoff(), DateTime::<Utc>::UNIX_EPOCH);
    }
}

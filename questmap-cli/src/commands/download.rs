//! `questmap download`: download notes for a tile rect and list visible quests.

use std::collections::HashSet;
use std::sync::{mpsc, Arc};

use chrono::Utc;
use clap::Args;
use console::style;
use tracing::info;

use questmap::config::{config_directory, ConfigFile};
use questmap::coord::TileRect;
use questmap::download::{
    DownloadService, DownloadTask, DownloadedTilesStore, FileDownloadedTiles,
    OsmNotesDownloader, TileDownloadCoordinator, NOTE_QUEST_TYPE,
};
use questmap::quest::{
    MemoryQuestStore, QuestGroup, RegisteredSource, TeamModeQuestFilter, VisibleQuestRegistry,
    VisibleQuestTypes,
};

use crate::error::CliError;
use crate::progress::{CliProgress, Completion};

/// File the freshness record is kept in, inside the config directory.
const DOWNLOADED_TILES_FILE: &str = "downloaded_tiles.json";

/// Arguments of `questmap download`.
#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Westernmost tile column
    #[arg(long)]
    pub left: u32,

    /// Northernmost tile row
    #[arg(long)]
    pub top: u32,

    /// Easternmost tile column (inclusive)
    #[arg(long)]
    pub right: u32,

    /// Southernmost tile row (inclusive)
    #[arg(long)]
    pub bottom: u32,

    /// Mark the download as user-initiated
    #[arg(long)]
    pub priority: bool,

    /// Tile zoom level (defaults to the configured tile_zoom)
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Forget previously downloaded areas and download again
    #[arg(long)]
    pub force: bool,
}

impl DownloadArgs {
    /// The requested rect, checked against the tile grid at `zoom`.
    fn tile_rect(&self, zoom: u8) -> Result<TileRect, CliError> {
        TileRect::new_at(zoom, self.left, self.top, self.right, self.bottom)
            .map_err(|e| CliError::InvalidArgs(e.to_string()))
    }
}

/// Run the download command.
pub fn run(args: DownloadArgs, config: &ConfigFile) -> Result<(), CliError> {
    let mut coordinator_config = config.coordinator_config();
    if let Some(zoom) = args.zoom {
        coordinator_config = coordinator_config.with_tile_zoom(zoom);
    }
    let zoom = coordinator_config.tile_zoom;
    let tiles = args.tile_rect(zoom)?;
    let bbox = tiles.as_bounding_box(zoom);

    println!("Area:   {} at zoom {}", tiles, zoom);
    println!("        {} ({} tiles)", bbox, tiles.size());
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    // Freshness record with housekeeping
    let record = Arc::new(FileDownloadedTiles::open(
        config_directory().join(DOWNLOADED_TILES_FILE),
    )?);
    if args.force {
        record.clear()?;
        info!("Cleared downloaded tiles record");
    } else {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(coordinator_config.refresh_data_after)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let removed = record.remove_older_than(cutoff)?;
        if removed > 0 {
            info!(removed, "Removed stale downloaded tiles entries");
        }
    }

    // Quest stores and visibility
    let notes = Arc::new(MemoryQuestStore::new(QuestGroup::OSM_NOTE));
    let team_mode = Arc::new(match config.team_mode.mode() {
        Some(mode) => TeamModeQuestFilter::with_mode(mode),
        None => TeamModeQuestFilter::new(),
    });
    let registry = VisibleQuestRegistry::new(
        vec![RegisteredSource::new(notes.clone())],
        Arc::new(VisibleQuestTypes::new()),
        team_mode,
    );

    // Download pipeline
    let notes_downloader = OsmNotesDownloader::with_timeout(
        config.notes_config(),
        notes,
        config.download.timeout_secs,
    )?;
    let tasks: Vec<Arc<dyn DownloadTask>> = vec![Arc::new(notes_downloader)];
    let coordinator = Arc::new(TileDownloadCoordinator::new(
        coordinator_config,
        tasks,
        record,
    ));

    if coordinator.has_downloaded_already(&tiles) {
        println!(
            "{}",
            style("Area was downloaded recently, nothing to do (use --force to download again)")
                .yellow()
        );
        return Ok(());
    }

    let (finished_tx, finished_rx) = mpsc::channel();
    let handle = DownloadService::start(coordinator, runtime.handle());
    handle.set_progress_listener(Some(Arc::new(CliProgress::new(finished_tx))));

    let cancel_handle = handle.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, cancelling download...");
        let _ = cancel_handle.cancel();
    })?;

    handle.request(tiles, args.priority)?;

    let completion = finished_rx
        .recv()
        .map_err(|_| CliError::Download("download service stopped".to_string()));
    handle.shutdown();
    let completion = completion?;

    match completion {
        Completion::Succeeded => {}
        Completion::Cancelled => {
            println!("Download cancelled.");
            return Ok(());
        }
        Completion::Failed(reason) => return Err(CliError::Download(reason)),
    }

    // Only quest types this command downloads
    let quest_types: HashSet<String> = [NOTE_QUEST_TYPE.to_string()].into_iter().collect();
    let visible = registry.all_visible(&bbox, &quest_types);

    println!();
    println!(
        "{} open quest(s) in area, {} visible to you",
        registry.visible_count(&bbox),
        style(visible.len()).bold()
    );
    for entry in &visible {
        let (lat, lon) = entry.quest.geometry.marker();
        println!(
            "  [{}] {} #{} at {:.5}, {:.5}",
            entry.group, entry.quest.quest_type, entry.quest.id, lat, lon
        );
    }

    Ok(())
}

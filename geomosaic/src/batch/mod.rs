//! Batch download orchestrator.
//!
//! Expands satellite × timestamp × coordinate-range into a task list,
//! filters it against the persisted blacklist, runs the remainder on a
//! bounded worker pool, retries failures exactly once, and aggregates
//! per-satellite statistics.
//!
//! # Ordering and shared state
//!
//! Results are collected in completion order and re-associated with
//! their originating task by value; no ordering is guaranteed across
//! tiles within a batch. Workers only return outcomes — the blacklist is
//! mutated exclusively by the orchestrating task after each wave fully
//! drains, and flushed to disk once per batch.

mod stats;

pub use stats::{BatchReport, SatelliteStats};

use crate::blacklist::Blacklist;
use crate::config::DownloadConfig;
use crate::coord::{tile_range_for, CoordError, SatelliteId, TileCoord, TileRange};
use crate::fetch::{FetchOutcome, TileFetcher};
use crate::provider::{AsyncHttpClient, TimeIndexError};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Errors that abort a whole batch.
///
/// Per-tile failures never surface here; they are aggregated into the
/// [`BatchReport`] instead.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Upstream time index unavailable or malformed
    #[error(transparent)]
    TimeIndex(#[from] TimeIndexError),

    /// Configuration error (unsupported zoom, unknown satellite)
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// Nothing to do: no timestamps after satellite and window filtering
    #[error("no timestamps to process (check satellite selection and trailing window)")]
    NoTimestamps,
}

/// One unit of download work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileTask {
    satellite: SatelliteId,
    timestamp: i64,
    coord: TileCoord,
}

/// Runs batches of tile downloads against one fetcher.
pub struct BatchDownloader<C> {
    fetcher: Arc<TileFetcher<C>>,
}

impl<C: AsyncHttpClient + 'static> BatchDownloader<C> {
    pub fn new(fetcher: TileFetcher<C>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }

    /// Runs one batch for the given satellites.
    ///
    /// Steps, in order: validate the zoom against every requested
    /// satellite (fail fast, before any network activity); fetch and
    /// filter the time index; expand the task list and skip blacklisted
    /// coordinates (synthesizing black placeholders); run the download
    /// wave; retry the failure set once; merge newly-blank coordinates
    /// into the blacklist and flush it; report per-satellite counts.
    pub async fn run(
        &self,
        satellites: &[SatelliteId],
        config: &DownloadConfig,
    ) -> Result<BatchReport, BatchError> {
        let zoom = config.zoom();

        let mut ranges: BTreeMap<SatelliteId, TileRange> = BTreeMap::new();
        for &satellite in satellites {
            ranges.insert(satellite, tile_range_for(satellite, zoom)?);
        }

        let mut index = self.fetcher.service().fetch_time_index().await?;
        index.retain_satellites(satellites);
        index.retain_recent(config.hours(), Utc::now());
        if index.is_empty() {
            return Err(BatchError::NoTimestamps);
        }

        let mut blacklist = Blacklist::load(config.blacklist_path());

        let mut report = BatchReport::default();
        let mut tasks = Vec::new();
        let batch_satellites: Vec<_> = index.satellites().collect();
        for &satellite in &batch_satellites {
            let Some(range) = ranges.get(&satellite) else {
                continue;
            };
            let stats = report.entry(satellite);
            stats.timestamps = index.timestamps(satellite).len();
            for &timestamp in index.timestamps(satellite) {
                for coord in range.iter() {
                    report.entry(satellite).total += 1;
                    if blacklist.is_blacklisted(satellite, zoom, coord) {
                        report.entry(satellite).skipped += 1;
                        if let Err(e) =
                            self.fetcher.write_placeholder(satellite, timestamp, coord, zoom)
                        {
                            warn!(
                                satellite = %satellite,
                                x = coord.x,
                                y = coord.y,
                                error = %e,
                                "Failed to synthesize placeholder for blacklisted tile"
                            );
                        }
                    } else {
                        tasks.push(TileTask {
                            satellite,
                            timestamp,
                            coord,
                        });
                    }
                }
            }
        }

        info!(
            satellites = batch_satellites.len(),
            tasks = tasks.len(),
            concurrency = config.concurrency(),
            zoom,
            "Starting batch download"
        );

        let mut delta = Blacklist::default();
        let mut failed_tasks = Vec::new();

        for (task, outcome) in self.run_wave(&tasks, zoom, config.concurrency()).await {
            let stats = report.entry(task.satellite);
            match outcome {
                FetchOutcome::Downloaded | FetchOutcome::AlreadyExists => stats.succeeded += 1,
                FetchOutcome::Blank => {
                    stats.succeeded += 1;
                    if delta.insert(task.satellite, zoom, task.coord) {
                        stats.newly_blacklisted += 1;
                    }
                }
                FetchOutcome::Failed => failed_tasks.push(task),
            }
        }

        // Retry is a second, independent bounded-concurrency wave over
        // the failure set, strictly after the first fully drains. Depth
        // is fixed at one: a task failing here stays failed.
        if !failed_tasks.is_empty() {
            info!(count = failed_tasks.len(), "Retrying failed tiles");
            for (task, outcome) in self
                .run_wave(&failed_tasks, zoom, config.concurrency())
                .await
            {
                let stats = report.entry(task.satellite);
                match outcome {
                    FetchOutcome::Downloaded | FetchOutcome::AlreadyExists => {
                        stats.succeeded += 1;
                        stats.retried += 1;
                    }
                    FetchOutcome::Blank => {
                        stats.succeeded += 1;
                        stats.retried += 1;
                        if delta.insert(task.satellite, zoom, task.coord) {
                            stats.newly_blacklisted += 1;
                        }
                    }
                    FetchOutcome::Failed => stats.failed += 1,
                }
            }
        }

        blacklist.merge(delta);
        if let Err(e) = blacklist.save(config.blacklist_path()) {
            warn!(path = %config.blacklist_path().display(), error = %e, "Failed to persist blacklist");
        }

        report.log_summary();
        Ok(report)
    }

    /// Runs one wave of tasks on the bounded worker pool and drains it
    /// completely before returning.
    async fn run_wave(
        &self,
        tasks: &[TileTask],
        zoom: u8,
        concurrency: usize,
    ) -> Vec<(TileTask, FetchOutcome)> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut downloads = JoinSet::new();

        for &task in tasks {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            downloads.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed unexpectedly");
                let outcome = fetcher
                    .fetch(task.satellite, task.timestamp, task.coord, zoom)
                    .await;
                (task, outcome)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = downloads.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => warn!(error = %e, "Download task panicked"),
            }
        }
        results
    }
}

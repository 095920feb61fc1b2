//! Integration tests for the batch download orchestrator.
//!
//! These drive the full batch flow against a scripted HTTP stub: time
//! index fetch, task expansion, bounded-concurrency download, the single
//! retry pass, blacklist persistence and per-satellite statistics.

use geomosaic::batch::BatchDownloader;
use geomosaic::blacklist::Blacklist;
use geomosaic::config::DownloadConfig;
use geomosaic::coord::{SatelliteId, TileCoord};
use geomosaic::fetch::TileFetcher;
use geomosaic::provider::{AsyncHttpClient, HttpError, TileService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const BASE_URL: &str = "https://tiles.test";

// =============================================================================
// Test Helpers
// =============================================================================

#[derive(Default)]
struct StubState {
    index_body: Vec<u8>,
    /// URL → remaining number of times it should fail before succeeding.
    fail_once: HashMap<String, usize>,
    /// URL → number of requests observed.
    calls: HashMap<String, usize>,
}

/// Scripted HTTP stub shared between the fetcher and the test body.
#[derive(Clone)]
struct StubServer {
    state: Arc<Mutex<StubState>>,
}

impl StubServer {
    fn new(index_body: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(StubState {
                index_body: index_body.as_bytes().to_vec(),
                ..Default::default()
            })),
        }
    }

    fn fail_once(&self, url: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_once
            .insert(url.to_string(), 1);
    }

    fn calls(&self, url: &str) -> usize {
        *self.state.lock().unwrap().calls.get(url).unwrap_or(&0)
    }
}

impl AsyncHttpClient for StubServer {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(url.to_string()).or_insert(0) += 1;

        if url.ends_with("/times/geocolor.json") {
            return Ok(state.index_body.clone());
        }
        if let Some(remaining) = state.fail_once.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HttpError::Status {
                    code: 503,
                    url: url.to_string(),
                });
            }
        }
        Ok(b"tile-bytes".to_vec())
    }
}

fn downloader(stub: &StubServer, dir: &TempDir) -> BatchDownloader<StubServer> {
    let service = TileService::with_base_url(stub.clone(), BASE_URL.to_string());
    BatchDownloader::new(TileFetcher::new(service, dir.path().join("downloads")))
}

fn config(dir: &TempDir) -> DownloadConfig {
    DownloadConfig::new()
        .with_hours(0)
        .with_concurrency(5)
        .with_downloads_root(dir.path().join("downloads"))
        .with_blacklist_path(dir.path().join("blacklist.json"))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn batch_retries_transient_failure_once_and_succeeds() {
    let dir = TempDir::new().unwrap();
    let stub = StubServer::new(r#"{"goes-east": [1000, 2000], "goes-west": [1500]}"#);

    // Timestamp 1000 is 1970-01-01 00:16 UTC; fail its (4, 0) tile once.
    let flaky_url = format!("{BASE_URL}/geocolor/goes-east/1970-01-01/0016/4/4/0.jpg");
    stub.fail_once(&flaky_url);

    let report = downloader(&stub, &dir)
        .run(&[SatelliteId::GoesEast, SatelliteId::GoesWest], &config(&dir))
        .await
        .unwrap();

    // goes-east: 8 columns × 3 rows × 2 timestamps.
    let east = report.get(SatelliteId::GoesEast).unwrap();
    assert_eq!(east.timestamps, 2);
    assert_eq!(east.total, 48);
    assert_eq!(east.succeeded, 48);
    assert_eq!(east.failed, 0, "retried tile must not count as failed");
    assert_eq!(east.retried, 1);
    assert_eq!(east.success_rate(), 1.0);

    // goes-west: 8 columns × 4 rows × 1 timestamp.
    let west = report.get(SatelliteId::GoesWest).unwrap();
    assert_eq!(west.total, 32);
    assert_eq!(west.succeeded, 32);
    assert_eq!(west.failed, 0);

    // The flaky tile was requested exactly twice: first pass + retry.
    assert_eq!(stub.calls(&flaky_url), 2);
    assert_eq!(report.total_failed(), 0);
}

#[tokio::test]
async fn second_batch_reuses_downloaded_tiles() {
    let dir = TempDir::new().unwrap();
    let stub = StubServer::new(r#"{"himawari": [1200]}"#);
    let downloader = downloader(&stub, &dir);
    let config = config(&dir);

    let first = downloader
        .run(&[SatelliteId::Himawari], &config)
        .await
        .unwrap();
    assert_eq!(first.get(SatelliteId::Himawari).unwrap().succeeded, 32);

    // 1970-01-01 00:20 UTC, himawari spans y 12..16 at zoom 4.
    let sample_url = format!("{BASE_URL}/geocolor/himawari/1970-01-01/0020/4/4/12.jpg");
    assert_eq!(stub.calls(&sample_url), 1);

    let second = downloader
        .run(&[SatelliteId::Himawari], &config)
        .await
        .unwrap();
    assert_eq!(second.get(SatelliteId::Himawari).unwrap().succeeded, 32);
    assert_eq!(second.get(SatelliteId::Himawari).unwrap().failed, 0);

    // Existing files short-circuit before the network.
    assert_eq!(stub.calls(&sample_url), 1);
}

#[tokio::test]
async fn blacklist_is_persisted_once_per_batch() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    // Seed one known-bad coordinate.
    let mut seeded = Blacklist::default();
    seeded.insert(SatelliteId::GoesEast, 4, TileCoord::new(4, 0));
    seeded.save(config.blacklist_path()).unwrap();

    let stub = StubServer::new(r#"{"goes-east": [1000]}"#);
    let report = downloader(&stub, &dir)
        .run(&[SatelliteId::GoesEast], &config)
        .await
        .unwrap();

    let east = report.get(SatelliteId::GoesEast).unwrap();
    assert_eq!(east.skipped, 1);
    assert_eq!(east.attempted(), 23);

    // The blacklisted coordinate never hit the network.
    let skipped_url = format!("{BASE_URL}/geocolor/goes-east/1970-01-01/0016/4/4/0.jpg");
    assert_eq!(stub.calls(&skipped_url), 0);

    // The store survived the batch-end rewrite unchanged.
    let reloaded = Blacklist::load(config.blacklist_path());
    assert!(reloaded.is_blacklisted(SatelliteId::GoesEast, 4, TileCoord::new(4, 0)));
    assert_eq!(reloaded.len(), 1);
}

//! Single-tile fetcher.
//!
//! Downloads one tile per call, writing to a temporary sibling and
//! renaming on full success so a partially-written tile is never taken
//! for a valid one by a later run. Downloads are idempotent: a tile whose
//! destination file already exists is never re-fetched.
//!
//! Blank detection by body size is an optional policy (off by default);
//! explicit blacklist management is the canonical way blank coordinates
//! are handled. When the policy is enabled, an undersized body is
//! replaced by a synthesized black placeholder and reported as
//! [`FetchOutcome::Blank`] so the orchestrator can record the coordinate.

use crate::coord::{SatelliteId, TileCoord};
use crate::layout;
use crate::provider::{AsyncHttpClient, HttpError, TileService};
use crate::time::date_time_parts;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Default edge length of an upstream tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Outcome of one tile fetch.
///
/// Per-tile failures never abort a batch; the orchestrator aggregates
/// outcomes and retries failures once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body downloaded and renamed into place
    Downloaded,
    /// Destination already existed; no network I/O performed
    AlreadyExists,
    /// Body was under the blank threshold; black placeholder written
    Blank,
    /// HTTP, network or local I/O failure (logged, nothing written)
    Failed,
}

impl FetchOutcome {
    /// Whether a usable tile file exists after this outcome.
    pub fn is_success(&self) -> bool {
        !matches!(self, FetchOutcome::Failed)
    }
}

/// Errors surfaced by placeholder synthesis and internal download steps.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unrepresentable timestamp: {0}")]
    BadTimestamp(i64),
}

/// Downloads tiles into the `downloads/` tree.
pub struct TileFetcher<C> {
    service: TileService<C>,
    downloads_root: PathBuf,
    tile_size: u32,
    blank_threshold: Option<u64>,
    black_tile: OnceLock<Vec<u8>>,
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    pub fn new(service: TileService<C>, downloads_root: impl Into<PathBuf>) -> Self {
        Self {
            service,
            downloads_root: downloads_root.into(),
            tile_size: DEFAULT_TILE_SIZE,
            blank_threshold: None,
            black_tile: OnceLock::new(),
        }
    }

    /// Enables blank detection: bodies smaller than `bytes` are treated
    /// as blank tiles.
    pub fn with_blank_threshold(mut self, bytes: u64) -> Self {
        self.blank_threshold = Some(bytes);
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// The upstream service this fetcher downloads from.
    pub fn service(&self) -> &TileService<C> {
        &self.service
    }

    /// Destination path of one tile.
    pub fn tile_path(
        &self,
        satellite: SatelliteId,
        timestamp: i64,
        coord: TileCoord,
        zoom: u8,
    ) -> Result<PathBuf, FetchError> {
        let (date, time) =
            date_time_parts(timestamp).ok_or(FetchError::BadTimestamp(timestamp))?;
        Ok(layout::tile_path(
            &self.downloads_root,
            satellite,
            zoom,
            &date,
            &time,
            coord,
        ))
    }

    /// Fetches one tile, classifying the outcome.
    ///
    /// Never returns an error: failures are logged (with the status code
    /// when the upstream rejected the request) and folded into
    /// [`FetchOutcome::Failed`].
    pub async fn fetch(
        &self,
        satellite: SatelliteId,
        timestamp: i64,
        coord: TileCoord,
        zoom: u8,
    ) -> FetchOutcome {
        let path = match self.tile_path(satellite, timestamp, coord, zoom) {
            Ok(path) => path,
            Err(e) => {
                warn!(satellite = %satellite, timestamp, error = %e, "Skipping tile with bad timestamp");
                return FetchOutcome::Failed;
            }
        };

        if path.exists() {
            debug!(path = %path.display(), "Tile already downloaded, skipping");
            return FetchOutcome::AlreadyExists;
        }

        match self.download_to(&path, satellite, timestamp, coord, zoom).await {
            Ok(outcome) => outcome,
            Err(FetchError::Http(HttpError::Status { code, url })) => {
                warn!(url = %url, status = code, "Tile download rejected");
                FetchOutcome::Failed
            }
            Err(e) => {
                warn!(
                    satellite = %satellite,
                    timestamp,
                    x = coord.x,
                    y = coord.y,
                    error = %e,
                    "Tile download failed"
                );
                FetchOutcome::Failed
            }
        }
    }

    async fn download_to(
        &self,
        path: &Path,
        satellite: SatelliteId,
        timestamp: i64,
        coord: TileCoord,
        zoom: u8,
    ) -> Result<FetchOutcome, FetchError> {
        let body = self.service.fetch_tile(satellite, timestamp, coord, zoom).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if self.blank_threshold.is_some_and(|t| (body.len() as u64) < t) {
            debug!(path = %path.display(), bytes = body.len(), "Undersized tile body, writing black placeholder");
            self.write_black_tile(path)?;
            return Ok(FetchOutcome::Blank);
        }

        let tmp = tmp_sibling(path);
        tokio::fs::write(&tmp, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = body.len(), "Tile downloaded");
        Ok(FetchOutcome::Downloaded)
    }

    /// Writes a black placeholder for a blacklisted coordinate so the
    /// mosaic stage still finds a tile there.
    ///
    /// Returns `false` without touching the filesystem if the tile
    /// already exists.
    pub fn write_placeholder(
        &self,
        satellite: SatelliteId,
        timestamp: i64,
        coord: TileCoord,
        zoom: u8,
    ) -> Result<bool, FetchError> {
        let path = self.tile_path(satellite, timestamp, coord, zoom)?;
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.write_black_tile(&path)?;
        Ok(true)
    }

    fn write_black_tile(&self, path: &Path) -> Result<(), FetchError> {
        // Encoded once per fetcher; a batch can synthesize thousands.
        let jpeg = match self.black_tile.get() {
            Some(jpeg) => jpeg,
            None => {
                let encoded = black_tile_jpeg(self.tile_size)?;
                self.black_tile.get_or_init(|| encoded)
            }
        };

        let tmp = tmp_sibling(path);
        std::fs::write(&tmp, jpeg)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Encodes a solid-black JPEG tile of the given edge length.
fn black_tile_jpeg(tile_size: u32) -> Result<Vec<u8>, image::ImageError> {
    let img = RgbImage::new(tile_size, tile_size);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HttpError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Mock client that counts requests.
    #[derive(Clone)]
    struct CountingClient {
        calls: Arc<AtomicUsize>,
        response: Result<Vec<u8>, HttpError>,
    }

    impl AsyncHttpClient for CountingClient {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, HttpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn fetcher(
        dir: &TempDir,
        response: Result<Vec<u8>, HttpError>,
    ) -> (TileFetcher<CountingClient>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = CountingClient {
            calls: Arc::clone(&calls),
            response,
        };
        let service = TileService::with_base_url(client, "https://tiles.test".to_string());
        (TileFetcher::new(service, dir.path()), calls)
    }

    const TS: i64 = 1614562200; // 2021-03-01 01:30 UTC

    #[tokio::test]
    async fn test_fetch_writes_body_to_final_path() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(&dir, Ok(b"jpeg-bytes".to_vec()));
        let coord = TileCoord::new(5, 2);

        let outcome = fetcher.fetch(SatelliteId::GoesEast, TS, coord, 4).await;
        assert_eq!(outcome, FetchOutcome::Downloaded);

        let path = fetcher.tile_path(SatelliteId::GoesEast, TS, coord, 4).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg-bytes");
        // No temp file left behind.
        assert!(!tmp_sibling(&path).exists());
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (fetcher, calls) = fetcher(&dir, Ok(b"jpeg-bytes".to_vec()));
        let coord = TileCoord::new(5, 2);

        let first = fetcher.fetch(SatelliteId::GoesEast, TS, coord, 4).await;
        let second = fetcher.fetch(SatelliteId::GoesEast, TS, coord, 4).await;

        assert_eq!(first, FetchOutcome::Downloaded);
        assert_eq!(second, FetchOutcome::AlreadyExists);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second fetch must not hit the network");
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(
            &dir,
            Err(HttpError::Status {
                code: 404,
                url: "https://tiles.test/x.jpg".to_string(),
            }),
        );
        let coord = TileCoord::new(5, 2);

        let outcome = fetcher.fetch(SatelliteId::GoesEast, TS, coord, 4).await;
        assert_eq!(outcome, FetchOutcome::Failed);

        let path = fetcher.tile_path(SatelliteId::GoesEast, TS, coord, 4).unwrap();
        assert!(!path.exists());
        assert!(!tmp_sibling(&path).exists());
    }

    #[tokio::test]
    async fn test_blank_threshold_substitutes_placeholder() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let client = CountingClient {
            calls: Arc::clone(&calls),
            response: Ok(vec![0u8; 16]),
        };
        let service = TileService::with_base_url(client, "https://tiles.test".to_string());
        let fetcher = TileFetcher::new(service, dir.path()).with_blank_threshold(200);
        let coord = TileCoord::new(5, 2);

        let outcome = fetcher.fetch(SatelliteId::GoesEast, TS, coord, 4).await;
        assert_eq!(outcome, FetchOutcome::Blank);

        // A decodable black tile was written in place of the body.
        let path = fetcher.tile_path(SatelliteId::GoesEast, TS, coord, 4).unwrap();
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE));
    }

    #[tokio::test]
    async fn test_write_placeholder_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (fetcher, calls) = fetcher(&dir, Ok(vec![]));
        let coord = TileCoord::new(4, 9);

        assert!(fetcher.write_placeholder(SatelliteId::MtgZero, TS, coord, 4).unwrap());
        assert!(!fetcher.write_placeholder(SatelliteId::MtgZero, TS, coord, 4).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "placeholders never hit the network");

        let path = fetcher.tile_path(SatelliteId::MtgZero, TS, coord, 4).unwrap();
        assert!(path.exists());
    }
}

//! Pipeline configuration.
//!
//! Groups the knobs of the download orchestrator behind a builder with
//! sensible defaults, so callers configure only what they care about.
//!
//! # Example
//!
//! ```
//! use geomosaic::config::DownloadConfig;
//!
//! let config = DownloadConfig::default();
//! assert_eq!(config.concurrency(), 20);
//! assert_eq!(config.zoom(), 4);
//!
//! let config = DownloadConfig::new()
//!     .with_concurrency(5)
//!     .with_hours(0)
//!     .with_zoom(5);
//! assert_eq!(config.concurrency(), 5);
//! ```

mod defaults;

pub use defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_HOURS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ZOOM,
};

use crate::blacklist::DEFAULT_BLACKLIST_PATH;
use std::path::{Path, PathBuf};

/// Configuration for one batch download run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Bound on simultaneous tile requests
    concurrency: usize,
    /// Trailing window in hours (0 = unlimited)
    hours: u32,
    /// Zoom level to download
    zoom: u8,
    /// Per-request timeout in seconds
    timeout_secs: u64,
    /// Blank-by-size policy threshold in bytes (disabled when `None`)
    blank_threshold: Option<u64>,
    /// Root of the downloaded tile tree
    downloads_root: PathBuf,
    /// Location of the persisted blacklist store
    blacklist_path: PathBuf,
}

impl DownloadConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bound on simultaneous tile requests.
    ///
    /// Values are clamped to at least 1. Default: 20.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the trailing window: only timestamps within the last `hours`
    /// are downloaded. 0 disables the filter. Default: 2.
    pub fn with_hours(mut self, hours: u32) -> Self {
        self.hours = hours;
        self
    }

    /// Sets the zoom level. Validated against the supported set when the
    /// batch starts, before any network activity. Default: 4.
    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    /// Sets the per-request timeout in seconds. Default: 15.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Enables the optional blank-by-size policy: response bodies under
    /// `bytes` are treated as blank tiles and blacklisted. Disabled by
    /// default; explicit blacklist management is canonical.
    pub fn with_blank_threshold(mut self, bytes: u64) -> Self {
        self.blank_threshold = Some(bytes);
        self
    }

    /// Sets the root directory of the downloaded tile tree.
    /// Default: `downloads`.
    pub fn with_downloads_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.downloads_root = root.into();
        self
    }

    /// Sets the blacklist store location. Default: `blacklist.json`.
    pub fn with_blacklist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.blacklist_path = path.into();
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn blank_threshold(&self) -> Option<u64> {
        self.blank_threshold
    }

    pub fn downloads_root(&self) -> &Path {
        &self.downloads_root
    }

    pub fn blacklist_path(&self) -> &Path {
        &self.blacklist_path
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            hours: DEFAULT_HOURS,
            zoom: DEFAULT_ZOOM,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            blank_threshold: None,
            downloads_root: PathBuf::from("downloads"),
            blacklist_path: PathBuf::from(DEFAULT_BLACKLIST_PATH),
        }
    }
}

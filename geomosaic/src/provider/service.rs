//! Tile server URL scheme and time index.
//!
//! The upstream server exposes two endpoints:
//!
//! - `{base}/times/geocolor.json` — JSON map of satellite id → list of
//!   integer timestamps (seconds since epoch, UTC)
//! - `{base}/geocolor/{sat}/{date}/{time}/{zoom}/{x}/{y}.jpg` — one tile

use super::http::{AsyncHttpClient, HttpError};
use crate::coord::{SatelliteId, TileCoord};
use crate::time::{date_time_parts, within_trailing_window};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Production tile server.
pub const DEFAULT_BASE_URL: &str = "https://tiles.zoom.earth";

/// Errors fetching or decoding the upstream time index.
///
/// Either variant aborts the whole batch: with no usable index there is
/// nothing to download.
#[derive(Debug, Error)]
pub enum TimeIndexError {
    /// Index endpoint unreachable or rejected the request
    #[error("time index unavailable: {0}")]
    Unavailable(#[from] HttpError),

    /// Index body was not the expected satellite → timestamps map
    #[error("malformed time index: {0}")]
    Malformed(String),
}

/// Per-satellite timestamp lists from the upstream time service.
///
/// Timestamps are kept sorted ascending and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeIndex {
    satellites: BTreeMap<SatelliteId, Vec<i64>>,
}

impl TimeIndex {
    /// Builds an index from explicit per-satellite timestamp lists.
    pub fn new(entries: impl IntoIterator<Item = (SatelliteId, Vec<i64>)>) -> Self {
        let mut index = TimeIndex::default();
        for (satellite, timestamps) in entries {
            index.insert(satellite, timestamps);
        }
        index
    }

    fn insert(&mut self, satellite: SatelliteId, mut timestamps: Vec<i64>) {
        timestamps.sort_unstable();
        timestamps.dedup();
        if !timestamps.is_empty() {
            self.satellites.insert(satellite, timestamps);
        }
    }

    /// Drops satellites not in `keep`.
    pub fn retain_satellites(&mut self, keep: &[SatelliteId]) {
        self.satellites.retain(|satellite, _| keep.contains(satellite));
    }

    /// Drops timestamps outside the trailing `hours` window ending at
    /// `now` (`hours == 0` keeps everything), then drops satellites left
    /// with no timestamps.
    pub fn retain_recent(&mut self, hours: u32, now: DateTime<Utc>) {
        for timestamps in self.satellites.values_mut() {
            timestamps.retain(|&ts| within_trailing_window(ts, hours, now));
        }
        self.satellites.retain(|_, timestamps| !timestamps.is_empty());
    }

    /// Satellites present in the index, in deterministic order.
    pub fn satellites(&self) -> impl Iterator<Item = SatelliteId> + '_ {
        self.satellites.keys().copied()
    }

    /// Timestamps for one satellite (empty if absent).
    pub fn timestamps(&self, satellite: SatelliteId) -> &[i64] {
        self.satellites
            .get(&satellite)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }

    /// Total number of (satellite, timestamp) pairs.
    pub fn len(&self) -> usize {
        self.satellites.values().map(Vec::len).sum()
    }
}

/// Upstream endpoint knowledge: URL templating and index decoding.
pub struct TileService<C> {
    client: C,
    base_url: String,
}

impl<C: AsyncHttpClient> TileService<C> {
    /// Creates a service against the production tile server.
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL.to_string())
    }

    /// Creates a service against a custom base URL (tests, mirrors).
    pub fn with_base_url(client: C, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// URL of one tile. Returns `None` for timestamps chrono cannot
    /// represent.
    pub fn tile_url(
        &self,
        satellite: SatelliteId,
        timestamp: i64,
        coord: TileCoord,
        zoom: u8,
    ) -> Option<String> {
        let (date, time) = date_time_parts(timestamp)?;
        Some(format!(
            "{}/geocolor/{}/{}/{}/{}/{}/{}.jpg",
            self.base_url, satellite, date, time, zoom, coord.x, coord.y
        ))
    }

    /// Downloads one tile body.
    pub async fn fetch_tile(
        &self,
        satellite: SatelliteId,
        timestamp: i64,
        coord: TileCoord,
        zoom: u8,
    ) -> Result<Vec<u8>, HttpError> {
        let url = self
            .tile_url(satellite, timestamp, coord, zoom)
            .ok_or_else(|| HttpError::Transport(format!("unrepresentable timestamp {timestamp}")))?;
        self.client.get(&url).await
    }

    /// Fetches and decodes the satellite time index.
    ///
    /// Satellites the upstream lists but this build does not know are
    /// skipped with a debug log; a body that is not a satellite →
    /// timestamps map is [`TimeIndexError::Malformed`].
    pub async fn fetch_time_index(&self) -> Result<TimeIndex, TimeIndexError> {
        let url = format!("{}/times/geocolor.json", self.base_url);
        let body = self.client.get(&url).await?;

        let parsed: BTreeMap<String, Vec<i64>> = serde_json::from_slice(&body)
            .map_err(|e| TimeIndexError::Malformed(e.to_string()))?;

        let mut index = TimeIndex::default();
        for (name, timestamps) in parsed {
            match SatelliteId::from_str(&name) {
                Ok(satellite) => index.insert(satellite, timestamps),
                Err(_) => {
                    debug!(satellite = %name, "Skipping unknown satellite in time index");
                }
            }
        }

        info!(
            satellites = index.satellites.len(),
            timestamps = index.len(),
            "Fetched satellite time index"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockHttpClient;
    use chrono::TimeZone;

    #[test]
    fn test_tile_url_format() {
        let service = TileService::with_base_url(
            MockHttpClient { response: Ok(vec![]) },
            "https://tiles.test/".to_string(),
        );
        // 2021-03-01 01:30:00 UTC
        let url = service
            .tile_url(SatelliteId::GoesEast, 1614562200, TileCoord::new(5, 2), 4)
            .unwrap();
        assert_eq!(
            url,
            "https://tiles.test/geocolor/goes-east/2021-03-01/0130/4/5/2.jpg"
        );
    }

    #[tokio::test]
    async fn test_time_index_parses_and_sorts() {
        let body = br#"{"goes-east": [2000, 1000, 2000], "himawari": [1500]}"#.to_vec();
        let service = TileService::new(MockHttpClient { response: Ok(body) });

        let index = service.fetch_time_index().await.unwrap();
        assert_eq!(index.timestamps(SatelliteId::GoesEast), &[1000, 2000]);
        assert_eq!(index.timestamps(SatelliteId::Himawari), &[1500]);
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_time_index_skips_unknown_satellites() {
        let body = br#"{"goes-east": [1000], "sputnik": [99]}"#.to_vec();
        let service = TileService::new(MockHttpClient { response: Ok(body) });

        let index = service.fetch_time_index().await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.timestamps(SatelliteId::GoesEast) == [1000]);
    }

    #[tokio::test]
    async fn test_time_index_malformed_body() {
        let service = TileService::new(MockHttpClient {
            response: Ok(b"[1, 2, 3]".to_vec()),
        });
        let result = service.fetch_time_index().await;
        assert!(matches!(result, Err(TimeIndexError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_time_index_http_failure() {
        let service = TileService::new(MockHttpClient {
            response: Err(HttpError::Transport("connection refused".to_string())),
        });
        let result = service.fetch_time_index().await;
        assert!(matches!(result, Err(TimeIndexError::Unavailable(_))));
    }

    #[test]
    fn test_retain_recent_and_satellites() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let recent = now.timestamp() - 1800;
        let stale = now.timestamp() - 10 * 3600;

        let mut index = TimeIndex::new([
            (SatelliteId::GoesEast, vec![recent, stale]),
            (SatelliteId::GoesWest, vec![stale]),
            (SatelliteId::Himawari, vec![recent]),
        ]);

        index.retain_recent(2, now);
        assert_eq!(index.timestamps(SatelliteId::GoesEast), &[recent]);
        assert!(index.timestamps(SatelliteId::GoesWest).is_empty());

        index.retain_satellites(&[SatelliteId::GoesEast]);
        let satellites: Vec<_> = index.satellites().collect();
        assert_eq!(satellites, vec![SatelliteId::GoesEast]);
    }
}

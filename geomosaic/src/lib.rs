//! GeoMosaic - geostationary satellite imagery pipeline
//!
//! This library downloads geocolor tiles for a set of geostationary
//! satellites from a public tile server, reassembles them into
//! per-timestamp mosaics, and blends overlapping satellite coverage into
//! global composites suitable for time-lapse rendering.
//!
//! # Pipeline
//!
//! ```text
//! time index ──► batch download ──► downloads/{sat}/{zoom}/{date}/{time}/x{X}_y{Y}.jpg
//!                                          │
//!                                          ▼
//!                                   mosaic builder ──► mosaics/{sat}/{zoom}/{date}/{time}.png
//!                                          │
//!                                          ▼
//!                                  blend compositor ──► {out}/{zoom}/{date}/{time}.png
//!                                          │
//!                                          ▼
//!                                  timelapse (ffmpeg)
//! ```
//!
//! Downloads are idempotent (existing tiles are never re-fetched),
//! coordinates known to be permanently blank are tracked in a persisted
//! blacklist, and failed tiles are retried exactly once per batch.

pub mod batch;
pub mod blacklist;
pub mod blend;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod layout;
pub mod logging;
pub mod mosaic;
pub mod provider;
pub mod time;
pub mod video;

/// Version of the GeoMosaic library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! On-disk layout for tiles, mosaics and composites.
//!
//! All three stages share the `{zoom}/{date}/{time}` convention:
//!
//! - tiles:      `{root}/{satellite}/{zoom}/{date}/{time}/x{X}_y{Y}.jpg`
//! - mosaics:    `{root}/{satellite}/{zoom}/{date}/{time}.png`
//! - composites: `{root}/{zoom}/{date}/{time}.png`

use crate::coord::{SatelliteId, TileCoord};
use std::path::{Path, PathBuf};

/// File name of a single downloaded tile, e.g. `x4_y12.jpg`.
pub fn tile_file_name(coord: TileCoord) -> String {
    format!("x{}_y{}.jpg", coord.x, coord.y)
}

/// Parses a tile file name back to its coordinate.
///
/// Accepts exactly the `x{X}_y{Y}.jpg` shape produced by
/// [`tile_file_name`]; anything else returns `None`.
pub fn parse_tile_file_name(name: &str) -> Option<TileCoord> {
    let stem = name.strip_suffix(".jpg")?;
    let (x_part, y_part) = stem.split_once('_')?;
    let x = x_part.strip_prefix('x')?.parse().ok()?;
    let y = y_part.strip_prefix('y')?.parse().ok()?;
    Some(TileCoord::new(x, y))
}

/// Directory holding every tile of one satellite timestamp.
pub fn tile_dir(root: &Path, satellite: SatelliteId, zoom: u8, date: &str, time: &str) -> PathBuf {
    root.join(satellite.as_str())
        .join(zoom.to_string())
        .join(date)
        .join(time)
}

/// Full path of one downloaded tile.
pub fn tile_path(
    root: &Path,
    satellite: SatelliteId,
    zoom: u8,
    date: &str,
    time: &str,
    coord: TileCoord,
) -> PathBuf {
    tile_dir(root, satellite, zoom, date, time).join(tile_file_name(coord))
}

/// Path of the reassembled mosaic for one satellite timestamp.
pub fn mosaic_path(
    root: &Path,
    satellite: SatelliteId,
    zoom: u8,
    date: &str,
    time: &str,
) -> PathBuf {
    root.join(satellite.as_str())
        .join(zoom.to_string())
        .join(date)
        .join(format!("{time}.png"))
}

/// Path of the blended composite for one global timestamp.
pub fn composite_path(root: &Path, zoom: u8, date: &str, time: &str) -> PathBuf {
    root.join(zoom.to_string())
        .join(date)
        .join(format!("{time}.png"))
}

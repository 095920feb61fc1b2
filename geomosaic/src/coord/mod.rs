//! Tile geometry
//!
//! Maps a satellite and zoom level (or a geographic bounding box) to the
//! rectangular range of tile column/row indices the upstream server
//! publishes. The global grid at zoom 4 is 16 rows tall with the visible
//! satellite disks occupying columns 4..12; zoom 5 doubles every bound.

mod types;

pub use types::{
    CoordError, SatelliteId, TileCoord, TileRange, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON,
    SUPPORTED_ZOOMS,
};

use std::f64::consts::PI;

/// Returns the tile range a satellite's disk covers at the given zoom.
///
/// Only zoom levels 4 and 5 are supported; anything else fails with
/// [`CoordError::UnsupportedZoom`]. The same `(satellite, zoom)` pair
/// always yields the identical, non-empty range.
pub fn tile_range_for(satellite: SatelliteId, zoom: u8) -> Result<TileRange, CoordError> {
    let scale = match zoom {
        4 => 1,
        5 => 2,
        other => return Err(CoordError::UnsupportedZoom(other)),
    };

    // Row sub-ranges partition the zoom-4 grid; msg-zero shares the
    // mtg-zero slot.
    let (y_start, y_end) = match satellite {
        SatelliteId::GoesEast => (0, 3),
        SatelliteId::GoesWest => (3, 7),
        SatelliteId::MtgZero | SatelliteId::MsgZero => (7, 10),
        SatelliteId::MsgIodc => (10, 12),
        SatelliteId::Himawari => (12, 16),
    };

    Ok(TileRange::new(
        4 * scale..12 * scale,
        y_start * scale..y_end * scale,
    ))
}

/// Converts a lon/lat bounding box to a tile range at the given zoom.
///
/// Uses the standard slippy-map projection. The minimum longitude and
/// maximum latitude select the top-left tile, the maximum longitude and
/// minimum latitude the bottom-right. The x-range excludes its upper
/// bound while the y-range includes its computed maximum (represented as
/// `y_max + 1` on the half-open range), guarding against truncation at
/// the southern edge.
pub fn tile_range_for_bounds(
    zoom: u8,
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
) -> Result<TileRange, CoordError> {
    if !SUPPORTED_ZOOMS.contains(&zoom) {
        return Err(CoordError::UnsupportedZoom(zoom));
    }
    for lat in [min_lat, max_lat] {
        if !(MIN_LAT..=MAX_LAT).contains(&lat) {
            return Err(CoordError::InvalidLatitude(lat));
        }
    }
    for lon in [min_lon, max_lon] {
        if !(MIN_LON..=MAX_LON).contains(&lon) {
            return Err(CoordError::InvalidLongitude(lon));
        }
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = n as u32 - 1;

    let tile_x = |lon: f64| ((((lon + 180.0) / 360.0) * n).floor() as u32).min(max_index);
    let tile_y = |lat: f64| {
        let lat_rad = lat.to_radians();
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
        (y.floor().max(0.0) as u32).min(max_index)
    };

    let x_start = tile_x(min_lon);
    let x_end = tile_x(max_lon);
    let y_start = tile_y(max_lat);
    let y_end = tile_y(min_lat);

    Ok(TileRange::new(x_start..x_end, y_start..y_end + 1))
}

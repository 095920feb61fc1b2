//! Mosaic builder.
//!
//! Reassembles a directory of downloaded tiles into a single image.
//! The canvas is sized from the coordinates actually present, so partial
//! tile sets still produce a correctly-sized mosaic with transparent
//! gaps where tiles are missing.
//!
//! Rotation is applied twice: once to each tile's pixel content and once
//! to its placement coordinate. Rotating the content alone would leave
//! tiles in their original grid positions and scramble the reassembled
//! image.

use crate::coord::{SatelliteId, TileCoord};
use crate::layout;
use crate::time::{parse_date_time, within_trailing_window};
use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from mosaic construction.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// Rotation not one of 0/90/180/270 degrees
    #[error("invalid rotation: {0} (valid: 0, 90, 180, 270)")]
    InvalidRotation(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Clockwise rotation applied to the whole mosaic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Whether this rotation exchanges the canvas axes.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = MosaicError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(MosaicError::InvalidRotation(other)),
        }
    }
}

/// Options for mosaic construction.
#[derive(Debug, Clone)]
pub struct MosaicOptions {
    /// Edge length of one tile in pixels
    pub tile_size: u32,
    /// Rotation applied to content and placement
    pub rotation: Rotation,
    /// Exchange x and y parsed from tile names before placement.
    ///
    /// The upstream naming convention and the desired mosaic orientation
    /// disagree on axis order, so this defaults to on.
    pub swap_xy: bool,
    /// Mark each tile with a frame and origin-corner box for debugging.
    /// Never used on imagery that feeds the blend stage.
    pub show_coords: bool,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            tile_size: 256,
            rotation: Rotation::None,
            swap_xy: true,
            show_coords: false,
        }
    }
}

/// Observed coordinate extent of the tiles in one directory.
struct Extent {
    x_min: u32,
    x_max: u32,
    y_min: u32,
    y_max: u32,
}

impl Extent {
    fn counts(&self) -> (u32, u32) {
        (self.x_max - self.x_min + 1, self.y_max - self.y_min + 1)
    }
}

/// Reassembles every tile in `tile_dir` into one image at `output_path`.
///
/// Idempotent: if the output already exists this logs and returns
/// without touching it. An empty or tile-less directory is skipped with
/// a warning. Tiles that fail to decode are logged and leave their
/// canvas region transparent.
pub fn build_mosaic(
    tile_dir: &Path,
    output_path: &Path,
    opts: &MosaicOptions,
) -> Result<(), MosaicError> {
    if output_path.exists() {
        info!(path = %output_path.display(), "Mosaic already exists, skipping");
        return Ok(());
    }

    // Placement coordinate (post-swap) → tile path + coordinate as named
    // on disk.
    let mut tiles: BTreeMap<TileCoord, (PathBuf, TileCoord)> = BTreeMap::new();
    for entry in fs::read_dir(tile_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(file_coord) = layout::parse_tile_file_name(name) else {
            if name.ends_with(".jpg") {
                warn!(file = name, "Unparsable tile name, skipping");
            }
            continue;
        };
        let placed = if opts.swap_xy {
            TileCoord::new(file_coord.y, file_coord.x)
        } else {
            file_coord
        };
        tiles.insert(placed, (entry.path(), file_coord));
    }

    if tiles.is_empty() {
        warn!(dir = %tile_dir.display(), "No tiles found, skipping mosaic");
        return Ok(());
    }

    let extent = Extent {
        x_min: tiles.keys().map(|c| c.x).min().unwrap_or(0),
        x_max: tiles.keys().map(|c| c.x).max().unwrap_or(0),
        y_min: tiles.keys().map(|c| c.y).min().unwrap_or(0),
        y_max: tiles.keys().map(|c| c.y).max().unwrap_or(0),
    };

    let tile_size = opts.tile_size;
    let (count_x, count_y) = extent.counts();
    let (canvas_w, canvas_h) = if opts.rotation.swaps_axes() {
        (count_y * tile_size, count_x * tile_size)
    } else {
        (count_x * tile_size, count_y * tile_size)
    };
    let mut canvas = RgbaImage::new(canvas_w, canvas_h);

    for (placed, (path, file_coord)) in &tiles {
        let tile = match image::open(path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to decode tile, leaving gap");
                continue;
            }
        };

        let tile = rotate_tile(tile, opts.rotation);
        let tile = if tile.dimensions() == (tile_size, tile_size) {
            tile
        } else {
            imageops::resize(&tile, tile_size, tile_size, FilterType::Triangle)
        };

        let (new_x, new_y) = place(*placed, &extent, opts.rotation);
        let px = i64::from(new_x) * i64::from(tile_size);
        let py = i64::from(new_y) * i64::from(tile_size);
        imageops::replace(&mut canvas, &tile, px, py);

        if opts.show_coords {
            debug!(
                x = file_coord.x,
                y = file_coord.y,
                new_x,
                new_y,
                "Marked tile placement"
            );
            mark_tile(&mut canvas, new_x * tile_size, new_y * tile_size, tile_size);
        }
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    canvas.save(output_path)?;
    info!(path = %output_path.display(), tiles = tiles.len(), "Mosaic written");
    Ok(())
}

/// Remaps a placement coordinate through the rotation transform.
fn place(coord: TileCoord, extent: &Extent, rotation: Rotation) -> (u32, u32) {
    match rotation {
        Rotation::None => (coord.x - extent.x_min, coord.y - extent.y_min),
        Rotation::Cw90 => (coord.y - extent.y_min, extent.x_max - coord.x),
        Rotation::Cw180 => (extent.x_max - coord.x, extent.y_max - coord.y),
        Rotation::Cw270 => (extent.y_max - coord.y, coord.x - extent.x_min),
    }
}

fn rotate_tile(tile: RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::None => tile,
        Rotation::Cw90 => imageops::rotate90(&tile),
        Rotation::Cw180 => imageops::rotate180(&tile),
        Rotation::Cw270 => imageops::rotate270(&tile),
    }
}

/// Debug overlay: a one-pixel frame plus a filled box at the tile's
/// origin corner. The marked mosaic is for visual inspection only.
fn mark_tile(canvas: &mut RgbaImage, px: u32, py: u32, tile_size: u32) {
    let frame = Rgba([255, 255, 255, 255]);
    let (w, h) = canvas.dimensions();

    for dx in 0..tile_size {
        let x = px + dx;
        if x < w {
            if py < h {
                canvas.put_pixel(x, py, frame);
            }
            let bottom = py + tile_size - 1;
            if bottom < h {
                canvas.put_pixel(x, bottom, frame);
            }
        }
    }
    for dy in 0..tile_size {
        let y = py + dy;
        if y < h {
            if px < w {
                canvas.put_pixel(px, y, frame);
            }
            let right = px + tile_size - 1;
            if right < w {
                canvas.put_pixel(right, y, frame);
            }
        }
    }

    let box_size = (tile_size / 16).max(4);
    for dy in 0..box_size {
        for dx in 0..box_size {
            let (x, y) = (px + dx, py + dy);
            if x < w && y < h {
                canvas.put_pixel(x, y, frame);
            }
        }
    }
}

/// Walks the download tree and builds one mosaic per satellite
/// timestamp, mirroring the tile layout under `mosaics_root`.
///
/// `satellites = None` processes every satellite found. Returns the
/// number of timestamp directories processed.
pub fn build_all_mosaics(
    downloads_root: &Path,
    mosaics_root: &Path,
    satellites: Option<&[SatelliteId]>,
    hours: u32,
    now: DateTime<Utc>,
    opts: &MosaicOptions,
) -> Result<usize, MosaicError> {
    let mut processed = 0;

    for sat_entry in fs::read_dir(downloads_root)? {
        let sat_entry = sat_entry?;
        if !sat_entry.file_type()?.is_dir() {
            continue;
        }
        let sat_name = sat_entry.file_name();
        let Ok(satellite) = sat_name.to_string_lossy().parse::<SatelliteId>() else {
            debug!(dir = %sat_name.to_string_lossy(), "Skipping non-satellite directory");
            continue;
        };
        if satellites.is_some_and(|keep| !keep.contains(&satellite)) {
            continue;
        }

        for zoom_entry in fs::read_dir(sat_entry.path())? {
            let zoom_entry = zoom_entry?;
            if !zoom_entry.file_type()?.is_dir() {
                continue;
            }
            let zoom_name = zoom_entry.file_name();
            let Ok(zoom) = zoom_name.to_string_lossy().parse::<u8>() else {
                debug!(dir = %zoom_name.to_string_lossy(), "Skipping non-zoom directory");
                continue;
            };

            for date_entry in fs::read_dir(zoom_entry.path())? {
                let date_entry = date_entry?;
                if !date_entry.file_type()?.is_dir() {
                    continue;
                }
                let date = date_entry.file_name().to_string_lossy().into_owned();

                for time_entry in fs::read_dir(date_entry.path())? {
                    let time_entry = time_entry?;
                    if !time_entry.file_type()?.is_dir() {
                        continue;
                    }
                    let time = time_entry.file_name().to_string_lossy().into_owned();

                    let Some(timestamp) = parse_date_time(&date, &time) else {
                        warn!(date = %date, time = %time, "Unparsable timestamp directory, skipping");
                        continue;
                    };
                    if !within_trailing_window(timestamp, hours, now) {
                        debug!(date = %date, time = %time, "Outside trailing window, skipping");
                        continue;
                    }

                    let output =
                        layout::mosaic_path(mosaics_root, satellite, zoom, &date, &time);
                    build_mosaic(&time_entry.path(), &output, opts)?;
                    processed += 1;
                }
            }
        }
    }

    info!(processed, "Mosaic pass complete");
    Ok(processed)
}

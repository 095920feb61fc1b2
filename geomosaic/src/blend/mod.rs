//! Blend compositor.
//!
//! For every unique timestamp across satellites, selects each
//! satellite's most recent mosaic at or before that timestamp
//! (carry-forward), resolves the mtg-zero/msg-zero alternate pair by
//! recency, pastes each selection at its fixed horizontal offset on a
//! shared transparent canvas, and merges with a per-pixel maximum
//! (lighten) so overlapping coverage combines without a hard seam.
//!
//! The composite canvas size is fixed per run, not per satellite, and
//! satellites are blended in a fixed order so output is deterministic.

use crate::coord::SatelliteId;
use crate::layout;
use crate::time::{date_time_parts, parse_date_time, within_trailing_window};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a compositing run.
#[derive(Debug, Error)]
pub enum BlendError {
    /// No mosaics found for the target zoom level
    #[error("no mosaics found under the input directory")]
    NoMosaics,

    /// Mosaics exist but none fall inside the trailing window
    #[error("no mosaics within the trailing window")]
    NoRecentMosaics,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Configuration for one compositing run.
#[derive(Debug, Clone)]
pub struct BlendConfig {
    /// Zoom level whose mosaics are composited
    pub zoom: u8,
    /// Trailing window in hours (0 = unlimited)
    pub hours: u32,
    /// Fixed composite canvas width in pixels
    pub canvas_width: u32,
    /// Fixed composite canvas height in pixels
    pub canvas_height: u32,
    /// Horizontal paste offset per satellite, in pixels
    pub offsets: BTreeMap<SatelliteId, u32>,
    /// Rebuild composites whose output already exists
    pub overwrite: bool,
}

impl BlendConfig {
    /// The production layout: a 4096×2048 canvas with each satellite's
    /// disk at its longitude slot. `msg-zero` pastes into the `mtg-zero`
    /// slot after alternate resolution, so it carries no offset of its
    /// own.
    pub fn default_offsets() -> BTreeMap<SatelliteId, u32> {
        BTreeMap::from([
            (SatelliteId::GoesWest, 0),
            (SatelliteId::GoesEast, 2 * 256),
            (SatelliteId::MtgZero, 6 * 256),
            (SatelliteId::MsgIodc, 9 * 256),
            (SatelliteId::Himawari, 11 * 256),
        ])
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            zoom: 4,
            hours: 0,
            canvas_width: 4096,
            canvas_height: 2048,
            offsets: Self::default_offsets(),
            overwrite: false,
        }
    }
}

/// Counts from one compositing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlendOutcome {
    /// Composites written
    pub generated: usize,
    /// Composites skipped because the output already existed
    pub skipped: usize,
}

/// Builds one composite per unique timestamp under `mosaics_root`.
///
/// Timestamps are processed strictly newest-first. `now` anchors the
/// trailing window.
pub fn build_composites(
    mosaics_root: &Path,
    output_root: &Path,
    config: &BlendConfig,
    now: DateTime<Utc>,
) -> Result<BlendOutcome, BlendError> {
    let mosaics = scan_mosaics(mosaics_root, config.zoom)?;
    if mosaics.is_empty() {
        return Err(BlendError::NoMosaics);
    }

    let mut timestamps: BTreeSet<i64> = BTreeSet::new();
    for per_satellite in mosaics.values() {
        timestamps.extend(per_satellite.keys());
    }
    timestamps.retain(|&ts| within_trailing_window(ts, config.hours, now));
    if timestamps.is_empty() {
        return Err(BlendError::NoRecentMosaics);
    }

    info!(
        satellites = mosaics.len(),
        timestamps = timestamps.len(),
        zoom = config.zoom,
        "Compositing newest-first"
    );

    let mut outcome = BlendOutcome::default();
    for &target in timestamps.iter().rev() {
        let Some((date, time)) = date_time_parts(target) else {
            continue;
        };
        let output = layout::composite_path(output_root, config.zoom, &date, &time);
        if !config.overwrite && output.exists() {
            debug!(path = %output.display(), "Composite already exists, skipping");
            outcome.skipped += 1;
            continue;
        }

        let selected = select_for_timestamp(&mosaics, target);
        if selected.is_empty() {
            warn!(timestamp = target, "No usable mosaic for timestamp, skipping");
            continue;
        }

        let mut canvas = RgbaImage::new(config.canvas_width, config.canvas_height);
        let mut contributed = 0;
        for (satellite, (source_ts, path)) in &selected {
            let Some(&offset_x) = config.offsets.get(satellite) else {
                warn!(satellite = %satellite, "No offset configured, skipping satellite");
                continue;
            };
            let mosaic = match image::open(path) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to open mosaic, skipping");
                    continue;
                }
            };
            lighten_paste(&mut canvas, &mosaic, offset_x);
            contributed += 1;
            debug!(
                satellite = %satellite,
                source_ts,
                timestamp = target,
                offset_x,
                "Blended mosaic"
            );
        }

        if contributed > 0 {
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            canvas.save(&output)?;
            outcome.generated += 1;
            info!(path = %output.display(), satellites = contributed, "Composite written");
        } else {
            warn!(timestamp = target, "No mosaic could be blended, nothing saved");
        }
    }

    info!(
        generated = outcome.generated,
        skipped = outcome.skipped,
        "Compositing complete"
    );
    Ok(outcome)
}

/// Per-satellite carry-forward selection with alternate resolution.
///
/// Every satellite contributes its most recent mosaic at or before
/// `target`. If both halves of the mtg-zero/msg-zero pair have one, only
/// the more recent survives, recorded under the mtg-zero identity (and
/// therefore its offset slot).
fn select_for_timestamp(
    mosaics: &BTreeMap<SatelliteId, BTreeMap<i64, PathBuf>>,
    target: i64,
) -> BTreeMap<SatelliteId, (i64, PathBuf)> {
    let mut selected: BTreeMap<SatelliteId, (i64, PathBuf)> = BTreeMap::new();
    for (&satellite, per_ts) in mosaics {
        if let Some((&ts, path)) = per_ts.range(..=target).next_back() {
            selected.insert(satellite, (ts, path.clone()));
        } else {
            debug!(satellite = %satellite, timestamp = target, "No mosaic at or before target");
        }
    }

    let mtg = selected.remove(&SatelliteId::MtgZero);
    let msg = selected.remove(&SatelliteId::MsgZero);
    let zero_slot = match (mtg, msg) {
        (Some(a), Some(b)) => Some(if a.0 >= b.0 { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    if let Some(winner) = zero_slot {
        selected.insert(SatelliteId::MtgZero, winner);
    }

    selected
}

/// Merges `overlay` into `canvas` at `(offset_x, 0)` with a channel-wise
/// per-pixel maximum. Overlapping coverage combines; nothing is ever
/// overwritten downward.
fn lighten_paste(canvas: &mut RgbaImage, overlay: &RgbaImage, offset_x: u32) {
    let (canvas_w, canvas_h) = canvas.dimensions();
    for (x, y, pixel) in overlay.enumerate_pixels() {
        let cx = x + offset_x;
        if cx >= canvas_w || y >= canvas_h {
            continue;
        }
        let existing = canvas.get_pixel_mut(cx, y);
        for channel in 0..4 {
            existing.0[channel] = existing.0[channel].max(pixel.0[channel]);
        }
    }
}

/// Collects `(satellite, timestamp) → mosaic path` for one zoom level.
///
/// A missing root scans as empty; undecodable path components are
/// skipped with a debug log.
fn scan_mosaics(
    root: &Path,
    zoom: u8,
) -> Result<BTreeMap<SatelliteId, BTreeMap<i64, PathBuf>>, BlendError> {
    let mut found: BTreeMap<SatelliteId, BTreeMap<i64, PathBuf>> = BTreeMap::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(e.into()),
    };

    for sat_entry in entries {
        let sat_entry = sat_entry?;
        if !sat_entry.file_type()?.is_dir() {
            continue;
        }
        let sat_name = sat_entry.file_name();
        let Ok(satellite) = sat_name.to_string_lossy().parse::<SatelliteId>() else {
            debug!(dir = %sat_name.to_string_lossy(), "Skipping non-satellite directory");
            continue;
        };

        let zoom_dir = sat_entry.path().join(zoom.to_string());
        let date_entries = match fs::read_dir(&zoom_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        for date_entry in date_entries {
            let date_entry = date_entry?;
            if !date_entry.file_type()?.is_dir() {
                continue;
            }
            let date = date_entry.file_name().to_string_lossy().into_owned();

            for file_entry in fs::read_dir(date_entry.path())? {
                let file_entry = file_entry?;
                let name = file_entry.file_name();
                let Some(time) = name.to_string_lossy().strip_suffix(".png").map(String::from)
                else {
                    continue;
                };
                let Some(timestamp) = parse_date_time(&date, &time) else {
                    debug!(date = %date, file = %name.to_string_lossy(), "Unparsable mosaic name, skipping");
                    continue;
                };
                found
                    .entry(satellite)
                    .or_default()
                    .insert(timestamp, file_entry.path());
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn write_mosaic(root: &Path, satellite: SatelliteId, ts: i64, color: [u8; 4]) {
        let (date, time) = date_time_parts(ts).unwrap();
        let path = layout::mosaic_path(root, satellite, 4, &date, &time);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(2, 2, Rgba(color)).save(&path).unwrap();
    }

    fn composite_pixel(root: &Path, ts: i64, x: u32, y: u32) -> [u8; 4] {
        let (date, time) = date_time_parts(ts).unwrap();
        let path = layout::composite_path(root, 4, &date, &time);
        image::open(&path).unwrap().to_rgba8().get_pixel(x, y).0
    }

    fn small_config(offsets: &[(SatelliteId, u32)]) -> BlendConfig {
        BlendConfig {
            zoom: 4,
            hours: 0,
            canvas_width: 8,
            canvas_height: 4,
            offsets: offsets.iter().copied().collect(),
            overwrite: false,
        }
    }

    const T1: i64 = 3600; // 1970-01-01 0100
    const T2: i64 = 7200; // 1970-01-01 0200

    #[test]
    fn test_lighten_rule_takes_channel_maximum() {
        let mut canvas = RgbaImage::new(2, 2);
        let a = RgbaImage::from_pixel(2, 2, Rgba([200, 0, 0, 255]));
        let b = RgbaImage::from_pixel(2, 2, Rgba([50, 180, 0, 255]));

        lighten_paste(&mut canvas, &a, 0);
        lighten_paste(&mut canvas, &b, 0);

        assert_eq!(canvas.get_pixel(0, 0).0, [200, 180, 0, 255]);
    }

    #[test]
    fn test_lighten_paste_respects_offset_and_bounds() {
        let mut canvas = RgbaImage::new(4, 2);
        let overlay = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));

        lighten_paste(&mut canvas, &overlay, 3);

        // Only column 3 fits; column 4 is clipped.
        assert_eq!(canvas.get_pixel(3, 0).0, [9, 9, 9, 255]);
        assert_eq!(canvas.get_pixel(2, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_alternate_satellite_resolved_by_recency() {
        let dir = TempDir::new().unwrap();
        let mosaics = dir.path().join("mosaics");
        let output = dir.path().join("blend");

        write_mosaic(&mosaics, SatelliteId::MtgZero, T1, [10, 0, 0, 255]);
        write_mosaic(&mosaics, SatelliteId::MsgZero, T2, [0, 20, 0, 255]);

        let config = small_config(&[(SatelliteId::MtgZero, 0)]);
        let outcome = build_composites(&mosaics, &output, &config, Utc::now()).unwrap();
        assert_eq!(outcome.generated, 2);

        // Target T2: both carry forward, msg-zero (T2) is more recent and
        // pastes into the mtg-zero offset slot.
        assert_eq!(composite_pixel(&output, T2, 0, 0), [0, 20, 0, 255]);
        // Target T1: only mtg-zero has data at or before it.
        assert_eq!(composite_pixel(&output, T1, 0, 0), [10, 0, 0, 255]);
    }

    #[test]
    fn test_carry_forward_uses_latest_not_after_target() {
        let dir = TempDir::new().unwrap();
        let mosaics = dir.path().join("mosaics");
        let output = dir.path().join("blend");

        write_mosaic(&mosaics, SatelliteId::Himawari, T1, [0, 0, 30, 255]);
        write_mosaic(&mosaics, SatelliteId::GoesEast, T2, [40, 0, 0, 255]);

        let config = small_config(&[(SatelliteId::Himawari, 0), (SatelliteId::GoesEast, 2)]);
        build_composites(&mosaics, &output, &config, Utc::now()).unwrap();

        // At T2, himawari has no exact match and carries forward its T1
        // mosaic; goes-east contributes at its own offset.
        assert_eq!(composite_pixel(&output, T2, 0, 0), [0, 0, 30, 255]);
        assert_eq!(composite_pixel(&output, T2, 2, 0), [40, 0, 0, 255]);
    }

    #[test]
    fn test_existing_composites_are_skipped_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let mosaics = dir.path().join("mosaics");
        let output = dir.path().join("blend");

        write_mosaic(&mosaics, SatelliteId::GoesEast, T1, [5, 5, 5, 255]);

        let (date, time) = date_time_parts(T1).unwrap();
        let existing = layout::composite_path(&output, 4, &date, &time);
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, b"sentinel").unwrap();

        let config = small_config(&[(SatelliteId::GoesEast, 0)]);
        let outcome = build_composites(&mosaics, &output, &config, Utc::now()).unwrap();

        assert_eq!(outcome.generated, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(fs::read(&existing).unwrap(), b"sentinel");
    }

    #[test]
    fn test_empty_tree_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = build_composites(
            &dir.path().join("missing"),
            &dir.path().join("blend"),
            &BlendConfig::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(BlendError::NoMosaics)));
    }

    #[test]
    fn test_satellite_without_offset_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mosaics = dir.path().join("mosaics");
        let output = dir.path().join("blend");

        write_mosaic(&mosaics, SatelliteId::GoesWest, T1, [7, 7, 7, 255]);

        // No offset for goes-west: nothing can contribute, nothing saved.
        let config = small_config(&[(SatelliteId::Himawari, 0)]);
        let outcome = build_composites(&mosaics, &output, &config, Utc::now()).unwrap();
        assert_eq!(outcome.generated, 0);
    }
}

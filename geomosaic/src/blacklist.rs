//! Persisted store of tile coordinates known to be permanently blank.
//!
//! The upstream server serves featureless tiles for coordinates outside a
//! satellite's visible disk; once identified they are recorded here so
//! later batches skip the network round-trip entirely. The store is a
//! single JSON file mapping satellite id → zoom (string key) → list of
//! `[x, y]` pairs, rewritten wholesale on each save.
//!
//! The blacklist is an explicit value owned by the batch orchestrator:
//! loaded once per run, mutated only after all workers for a batch have
//! completed, and flushed exactly once. Entries are never removed
//! automatically.

use crate::coord::{SatelliteId, TileCoord};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Default location of the persisted store, relative to the working
/// directory.
pub const DEFAULT_BLACKLIST_PATH: &str = "blacklist.json";

type Coords = BTreeSet<TileCoord>;

/// In-memory blacklist state.
///
/// Grows monotonically within a run. Ordered containers keep the
/// serialized form byte-stable across save/load cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    entries: BTreeMap<SatelliteId, BTreeMap<u8, Coords>>,
}

impl Blacklist {
    /// Loads the store from `path`.
    ///
    /// A missing file yields an empty blacklist; an unparsable file is
    /// logged and likewise treated as empty. Never fatal.
    pub fn load(path: &Path) -> Blacklist {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No blacklist store, starting empty");
                return Blacklist::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read blacklist, starting empty");
                return Blacklist::default();
            }
        };

        match serde_json::from_str::<BTreeMap<String, BTreeMap<String, Vec<[u32; 2]>>>>(&raw) {
            Ok(parsed) => {
                let mut blacklist = Blacklist::default();
                for (sat_name, zooms) in parsed {
                    let satellite = match SatelliteId::from_str(&sat_name) {
                        Ok(satellite) => satellite,
                        Err(_) => {
                            warn!(satellite = %sat_name, "Skipping unknown satellite in blacklist");
                            continue;
                        }
                    };
                    for (zoom_key, coords) in zooms {
                        let zoom: u8 = match zoom_key.parse() {
                            Ok(zoom) => zoom,
                            Err(_) => {
                                warn!(satellite = %sat_name, zoom = %zoom_key, "Skipping unparsable zoom key in blacklist");
                                continue;
                            }
                        };
                        for [x, y] in coords {
                            blacklist.insert(satellite, zoom, TileCoord::new(x, y));
                        }
                    }
                }
                debug!(entries = blacklist.len(), path = %path.display(), "Loaded blacklist");
                blacklist
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unparsable blacklist store, starting empty");
                Blacklist::default()
            }
        }
    }

    /// Serializes the full state to `path`, overwriting the store.
    ///
    /// Writes to a temporary sibling and renames, so a crashed save never
    /// truncates the previous store. Callers flush at most once per
    /// batch.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut raw: BTreeMap<String, BTreeMap<String, Vec<[u32; 2]>>> = BTreeMap::new();
        for (satellite, zooms) in &self.entries {
            let sat_entry = raw.entry(satellite.as_str().to_string()).or_default();
            for (zoom, coords) in zooms {
                sat_entry.insert(
                    zoom.to_string(),
                    coords.iter().map(|c| [c.x, c.y]).collect(),
                );
            }
        }

        let json = serde_json::to_string_pretty(&raw)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!(entries = self.len(), path = %path.display(), "Saved blacklist");
        Ok(())
    }

    /// Whether a coordinate is known to be blank.
    pub fn is_blacklisted(&self, satellite: SatelliteId, zoom: u8, coord: TileCoord) -> bool {
        self.entries
            .get(&satellite)
            .and_then(|zooms| zooms.get(&zoom))
            .is_some_and(|coords| coords.contains(&coord))
    }

    /// Records a coordinate as blank. Returns `true` if it was new.
    pub fn insert(&mut self, satellite: SatelliteId, zoom: u8, coord: TileCoord) -> bool {
        self.entries
            .entry(satellite)
            .or_default()
            .entry(zoom)
            .or_default()
            .insert(coord)
    }

    /// Merges another blacklist into this one.
    pub fn merge(&mut self, other: Blacklist) {
        for (satellite, zooms) in other.entries {
            for (zoom, coords) in zooms {
                self.entries
                    .entry(satellite)
                    .or_default()
                    .entry(zoom)
                    .or_default()
                    .extend(coords);
            }
        }
    }

    /// Total number of blacklisted coordinates across all satellites.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|zooms| zooms.values())
            .map(|coords| coords.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Tile coordinate type definitions

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels for which the upstream server publishes geocolor tiles.
pub const SUPPORTED_ZOOMS: [u8; 2] = [4, 5];

/// Identifier of a geostationary satellite known to the upstream server.
///
/// `MtgZero` and `MsgZero` cover the same zero-meridian slot; `MtgZero`
/// is the primary identity and at most one of the pair contributes to any
/// composite timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SatelliteId {
    GoesEast,
    GoesWest,
    Himawari,
    MsgIodc,
    MsgZero,
    MtgZero,
}

impl SatelliteId {
    /// All satellites, in the deterministic order used for compositing.
    pub const ALL: [SatelliteId; 6] = [
        SatelliteId::GoesEast,
        SatelliteId::GoesWest,
        SatelliteId::Himawari,
        SatelliteId::MsgIodc,
        SatelliteId::MsgZero,
        SatelliteId::MtgZero,
    ];

    /// The upstream identifier used in URLs and directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SatelliteId::GoesEast => "goes-east",
            SatelliteId::GoesWest => "goes-west",
            SatelliteId::Himawari => "himawari",
            SatelliteId::MsgIodc => "msg-iodc",
            SatelliteId::MsgZero => "msg-zero",
            SatelliteId::MtgZero => "mtg-zero",
        }
    }

    /// The other satellite sharing this one's geographic slot, if any.
    pub fn alternate(&self) -> Option<SatelliteId> {
        match self {
            SatelliteId::MtgZero => Some(SatelliteId::MsgZero),
            SatelliteId::MsgZero => Some(SatelliteId::MtgZero),
            _ => None,
        }
    }

    /// The primary identity of this satellite's geographic slot.
    ///
    /// `MsgZero` resolves to `MtgZero`; every other satellite is its own
    /// primary.
    pub fn slot_primary(&self) -> SatelliteId {
        match self {
            SatelliteId::MsgZero => SatelliteId::MtgZero,
            other => *other,
        }
    }
}

impl fmt::Display for SatelliteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SatelliteId {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "goes-east" => Ok(SatelliteId::GoesEast),
            "goes-west" => Ok(SatelliteId::GoesWest),
            "himawari" => Ok(SatelliteId::Himawari),
            "msg-iodc" => Ok(SatelliteId::MsgIodc),
            "msg-zero" => Ok(SatelliteId::MsgZero),
            "mtg-zero" => Ok(SatelliteId::MtgZero),
            other => Err(CoordError::UnknownSatellite(other.to_string())),
        }
    }
}

/// A tile position within a satellite's grid at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Column index (0 at the grid's western edge)
    pub x: u32,
    /// Row index (0 at the grid's northern edge)
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A rectangular range of tile coordinates.
///
/// Both axes are half-open (`start` inclusive, `end` exclusive). Ranges
/// built from geographic bounds bake the southern-edge guard into `y.end`
/// (see [`tile_range_for_bounds`](crate::coord::tile_range_for_bounds)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRange {
    pub x: Range<u32>,
    pub y: Range<u32>,
}

impl TileRange {
    pub fn new(x: Range<u32>, y: Range<u32>) -> Self {
        Self { x, y }
    }

    /// Number of tile columns covered.
    pub fn count_x(&self) -> u32 {
        self.x.end.saturating_sub(self.x.start)
    }

    /// Number of tile rows covered.
    pub fn count_y(&self) -> u32 {
        self.y.end.saturating_sub(self.y.start)
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty()
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.x.contains(&coord.x) && self.y.contains(&coord.y)
    }

    /// Pixel dimensions of a canvas holding every tile in this range.
    pub fn canvas_size(&self, tile_size: u32) -> (u32, u32) {
        (self.count_x() * tile_size, self.count_y() * tile_size)
    }

    /// Iterates every coordinate in the range, column-major.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.x
            .clone()
            .flat_map(|x| self.y.clone().map(move |y| TileCoord { x, y }))
    }
}

/// Errors from tile geometry lookups and conversions.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Zoom level outside the supported set {4, 5}
    UnsupportedZoom(u8),
    /// Satellite name not in the known set
    UnknownSatellite(String),
    /// Latitude outside the Web Mercator range
    InvalidLatitude(f64),
    /// Longitude outside -180..=180
    InvalidLongitude(f64),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::UnsupportedZoom(zoom) => {
                write!(
                    f,
                    "Unsupported zoom level: {} (supported: {:?})",
                    zoom, SUPPORTED_ZOOMS
                )
            }
            CoordError::UnknownSatellite(name) => {
                write!(f, "Unknown satellite: '{}'", name)
            }
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}

//! Helpers shared between commands.

use crate::error::CliError;
use geomosaic::coord::SatelliteId;

/// Parses `--satellites` values, defaulting to every satellite when none
/// were given. Unknown names fail fast before any work begins.
pub fn parse_satellites(names: &[String]) -> Result<Vec<SatelliteId>, CliError> {
    if names.is_empty() {
        return Ok(SatelliteId::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| name.parse::<SatelliteId>().map_err(CliError::from))
        .collect()
}

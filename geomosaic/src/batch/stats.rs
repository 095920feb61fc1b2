//! Per-satellite batch statistics.

use crate::coord::SatelliteId;
use std::collections::BTreeMap;
use tracing::info;

/// Aggregate counts for one satellite across a batch.
///
/// `total` covers the full expected grid; `skipped` are blacklisted
/// coordinates that never reached the network. Success rate is computed
/// over attempted tiles only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SatelliteStats {
    /// Timestamps processed for this satellite
    pub timestamps: usize,
    /// Expected tiles across all timestamps
    pub total: usize,
    /// Tiles skipped because their coordinate is blacklisted
    pub skipped: usize,
    /// Tiles with a usable file after the batch (downloads, pre-existing
    /// files and blank placeholders)
    pub succeeded: usize,
    /// Tiles still failed after the retry pass
    pub failed: usize,
    /// Coordinates newly added to the blacklist this batch
    pub newly_blacklisted: usize,
    /// Tiles that failed once and succeeded on retry
    pub retried: usize,
}

impl SatelliteStats {
    /// Tiles that actually went to the worker pool.
    pub fn attempted(&self) -> usize {
        self.total.saturating_sub(self.skipped)
    }

    /// Fraction of attempted tiles that succeeded (1.0 when nothing was
    /// attempted).
    pub fn success_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            1.0
        } else {
            self.succeeded as f64 / attempted as f64
        }
    }
}

/// Batch outcome keyed by satellite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    per_satellite: BTreeMap<SatelliteId, SatelliteStats>,
}

impl BatchReport {
    pub(crate) fn entry(&mut self, satellite: SatelliteId) -> &mut SatelliteStats {
        self.per_satellite.entry(satellite).or_default()
    }

    pub fn get(&self, satellite: SatelliteId) -> Option<&SatelliteStats> {
        self.per_satellite.get(&satellite)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SatelliteId, &SatelliteStats)> {
        self.per_satellite.iter().map(|(s, stats)| (*s, stats))
    }

    pub fn is_empty(&self) -> bool {
        self.per_satellite.is_empty()
    }

    /// Total tiles still failed after retries, across all satellites.
    pub fn total_failed(&self) -> usize {
        self.per_satellite.values().map(|s| s.failed).sum()
    }

    /// Logs one summary line per satellite.
    pub fn log_summary(&self) {
        for (satellite, stats) in &self.per_satellite {
            info!(
                satellite = %satellite,
                timestamps = stats.timestamps,
                total = stats.total,
                skipped = stats.skipped,
                succeeded = stats.succeeded,
                failed = stats.failed,
                newly_blacklisted = stats.newly_blacklisted,
                retried = stats.retried,
                success_rate_pct = stats.success_rate() * 100.0,
                "Batch summary"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_over_attempted_only() {
        let stats = SatelliteStats {
            timestamps: 1,
            total: 10,
            skipped: 2,
            succeeded: 6,
            failed: 2,
            ..Default::default()
        };
        assert_eq!(stats.attempted(), 8);
        assert!((stats.success_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_with_nothing_attempted() {
        let stats = SatelliteStats {
            total: 4,
            skipped: 4,
            ..Default::default()
        };
        assert_eq!(stats.success_rate(), 1.0);
    }

    #[test]
    fn test_report_accumulates_per_satellite() {
        let mut report = BatchReport::default();
        report.entry(SatelliteId::GoesEast).succeeded += 3;
        report.entry(SatelliteId::GoesEast).failed += 1;
        report.entry(SatelliteId::Himawari).succeeded += 2;

        assert_eq!(report.get(SatelliteId::GoesEast).unwrap().succeeded, 3);
        assert_eq!(report.total_failed(), 1);
        assert_eq!(report.iter().count(), 2);
    }
}

//! Scan parameter record persisted next to every acquisition.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Flat key-value record of the parameters that produced an acquisition.
///
/// Written alongside the raw and registered volumes so a dataset can be
/// interpreted (and a scan reproduced) without the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParameters {
    pub zone_count: usize,
    /// Number of overlapping fields of view covered by the scan.
    pub overlap_factor: usize,
    /// Scan midpoint (x, y) in millimeters.
    pub scan_midpoint_mm: (f64, f64),
    pub scan_range_mm: f64,
    pub scan_velocity_mm_per_s: f64,
    pub exposure_time_us: f64,
    pub pixel_size_mm: f64,
}

impl ScanParameters {
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }

    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params() -> ScanParameters {
        ScanParameters {
            zone_count: 5,
            overlap_factor: 1,
            scan_midpoint_mm: (0.0, 0.0),
            scan_range_mm: 0.5404,
            scan_velocity_mm_per_s: 0.22225,
            exposure_time_us: 50.0,
            pixel_size_mm: 0.35e-3,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan_params.json");

        let original = params();
        original.save_to_file(&path).unwrap();
        let loaded = ScanParameters::load_from_file(&path).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_flat_key_value_document() {
        let json = serde_json::to_value(params()).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("zone_count"));
        assert!(object.contains_key("scan_range_mm"));
        // Every value is a scalar or a plain coordinate pair, no nesting.
        assert!(object["exposure_time_us"].is_number());
    }
}

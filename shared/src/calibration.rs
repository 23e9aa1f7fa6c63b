//! Calibration storage for column-intensity correction data.
//!
//! Multi-zone scans pick up a fixed per-column interference pattern that
//! differs with the number of configured zones. A flat-field calibration
//! scan records one mean-column vector per zone, keyed by zone count; the
//! reconstruction pipeline divides each plane row by its normalized vector
//! before registration. All data lives in ~/.zonescan/ by default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per-zone column-intensity vectors for one zone count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCorrection {
    /// One vector per zone, each `width` entries long.
    pub vectors: Vec<Vec<f64>>,
}

impl ColumnCorrection {
    pub fn new(vectors: Vec<Vec<f64>>) -> Self {
        Self { vectors }
    }

    pub fn zone_count(&self) -> usize {
        self.vectors.len()
    }

    /// Column count the vectors were calibrated for.
    pub fn width(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }

    /// Vectors scaled so their global mean is 1, matching the element-wise
    /// divide applied during reconstruction.
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        let count: usize = self.vectors.iter().map(Vec::len).sum();
        if count == 0 {
            return Vec::new();
        }
        let mean = self.vectors.iter().flatten().sum::<f64>() / count as f64;
        self.vectors
            .iter()
            .map(|v| v.iter().map(|x| x / mean).collect())
            .collect()
    }
}

/// Storage manager for calibration files.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    /// Root directory for all calibration data (e.g. ~/.zonescan).
    root_path: PathBuf,
}

impl CalibrationStore {
    /// Create a store at the default path (~/.zonescan).
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(Self {
            root_path: PathBuf::from(home).join(".zonescan"),
        })
    }

    /// Create a store with a custom root path.
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn column_correction_path(&self) -> PathBuf {
        self.root_path.join("column_correction.json")
    }

    /// Get the column correction for a zone count.
    ///
    /// Returns None if no calibration file exists or it has no entry for
    /// this zone count. Returns Some(Err) if the file exists but cannot be
    /// read. Callers treat None as a warning, not an error.
    pub fn get_column_correction(
        &self,
        zone_count: usize,
    ) -> Option<std::io::Result<ColumnCorrection>> {
        let path = self.column_correction_path();
        if !path.exists() {
            return None;
        }

        match load_correction_map(&path) {
            Ok(mut map) => map
                .remove(&zone_count.to_string())
                .map(|vectors| Ok(ColumnCorrection::new(vectors))),
            Err(e) => Some(Err(e)),
        }
    }

    /// Save the column correction for a zone count, preserving entries for
    /// other zone counts. Creates the store directory if needed.
    pub fn save_column_correction(
        &self,
        zone_count: usize,
        correction: &ColumnCorrection,
    ) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root_path)?;
        let path = self.column_correction_path();

        let mut map = if path.exists() {
            load_correction_map(&path)?
        } else {
            HashMap::new()
        };
        map.insert(zone_count.to_string(), correction.vectors.clone());

        let contents = serde_json::to_string_pretty(&map)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

fn load_correction_map(path: &Path) -> std::io::Result<HashMap<String, Vec<Vec<f64>>>> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CalibrationStore) {
        let dir = TempDir::new().unwrap();
        let store = CalibrationStore::with_path(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_none() {
        let (_dir, store) = store();
        assert!(store.get_column_correction(3).is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_dir, store) = store();
        let correction = ColumnCorrection::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        store.save_column_correction(2, &correction).unwrap();

        let loaded = store.get_column_correction(2).unwrap().unwrap();
        assert_eq!(loaded, correction);
    }

    #[test]
    fn test_other_zone_counts_preserved_on_save() {
        let (_dir, store) = store();
        let two = ColumnCorrection::new(vec![vec![1.0], vec![2.0]]);
        let three = ColumnCorrection::new(vec![vec![1.0], vec![2.0], vec![3.0]]);

        store.save_column_correction(2, &two).unwrap();
        store.save_column_correction(3, &three).unwrap();

        assert_eq!(store.get_column_correction(2).unwrap().unwrap(), two);
        assert_eq!(store.get_column_correction(3).unwrap().unwrap(), three);
    }

    #[test]
    fn test_missing_zone_count_entry_is_none() {
        let (_dir, store) = store();
        let two = ColumnCorrection::new(vec![vec![1.0], vec![2.0]]);
        store.save_column_correction(2, &two).unwrap();

        assert!(store.get_column_correction(5).is_none());
    }

    #[test]
    fn test_normalized_has_unit_mean() {
        let correction = ColumnCorrection::new(vec![vec![2.0, 4.0], vec![6.0, 8.0]]);
        let normalized = correction.normalized();

        let count: usize = normalized.iter().map(Vec::len).sum();
        let mean = normalized.iter().flatten().sum::<f64>() / count as f64;
        assert!((mean - 1.0).abs() < 1e-12);
        // Scale is mean 5.0, so the first entry becomes 2/5.
        assert!((normalized[0][0] - 0.4).abs() < 1e-12);
    }
}

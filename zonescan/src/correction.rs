//! Column-intensity correction.
//!
//! The zone readout leaves a fixed per-column interference pattern on every
//! plane. A flat-field calibration records one mean-column vector per zone;
//! dividing each plane by its vector (normalized to unit global mean)
//! flattens the pattern without changing overall brightness. Applied after
//! the overlap crop and before registration, on the floating-point planes.

use ndarray::{Array1, Array2};
use shared::calibration::ColumnCorrection;
use tracing::warn;

/// Divide each plane by its zone's normalized column vector, in place.
///
/// A correction recorded for a different zone count or column width cannot
/// apply; the planes pass through unchanged with a warning, matching the
/// missing-calibration policy.
pub fn apply_column_correction(planes: &mut [Array2<f64>], correction: &ColumnCorrection) {
    if correction.zone_count() != planes.len() {
        warn!(
            "Column correction covers {} zones but {} planes are present, skipping",
            correction.zone_count(),
            planes.len()
        );
        return;
    }

    let normalized = correction.normalized();
    for (zone, (plane, vector)) in planes.iter().zip(&normalized).enumerate() {
        if vector.len() != plane.ncols() {
            warn!(
                "Column correction for zone {} has {} entries but planes are {} wide, skipping",
                zone,
                vector.len(),
                plane.ncols()
            );
            return;
        }
    }

    for (plane, vector) in planes.iter_mut().zip(&normalized) {
        let divisor = Array1::from_vec(vector.clone());
        for mut row in plane.rows_mut() {
            row.zip_mut_with(&divisor, |value, v| *value /= v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divides_by_normalized_vector() {
        // Vectors [1, 3] over two zones: global mean 2, normalized
        // [0.5, 1.5] per zone.
        let correction = ColumnCorrection::new(vec![vec![1.0, 3.0], vec![1.0, 3.0]]);
        let mut planes = vec![
            Array2::from_elem((2, 2), 6.0),
            Array2::from_elem((2, 2), 6.0),
        ];

        apply_column_correction(&mut planes, &correction);

        assert!((planes[0][[0, 0]] - 12.0).abs() < 1e-12);
        assert!((planes[0][[0, 1]] - 4.0).abs() < 1e-12);
        assert!((planes[1][[1, 1]] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_zone_count_mismatch_leaves_planes_untouched() {
        let correction = ColumnCorrection::new(vec![vec![2.0, 2.0]]);
        let mut planes = vec![
            Array2::from_elem((2, 2), 6.0),
            Array2::from_elem((2, 2), 6.0),
        ];

        apply_column_correction(&mut planes, &correction);

        assert!((planes[0][[0, 0]] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_width_mismatch_leaves_all_planes_untouched() {
        let correction = ColumnCorrection::new(vec![vec![2.0, 2.0], vec![2.0, 2.0, 2.0]]);
        let mut planes = vec![
            Array2::from_elem((2, 2), 6.0),
            Array2::from_elem((2, 2), 6.0),
        ];

        apply_column_correction(&mut planes, &correction);

        assert!((planes[0][[0, 0]] - 6.0).abs() < 1e-12);
        assert!((planes[1][[0, 0]] - 6.0).abs() < 1e-12);
    }
}

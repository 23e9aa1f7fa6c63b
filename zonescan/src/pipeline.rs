//! Post-acquisition reconstruction pipeline.
//!
//! Runs strictly after the grab loop has filled the reconstruction volume:
//! overlap crop, column correction, pairwise registration, common-shape
//! stack. Registration never sees a partially-filled plane.

use crate::correction::apply_column_correction;
use crate::demux::ReconstructionVolume;
use crate::error::ScanResult;
use crate::overlap::crop_to_overlap;
use crate::registration::register_planes;
use crate::stack::{assemble, RegisteredVolume};
use ndarray::Array3;
use shared::calibration::ColumnCorrection;
use shared::zone::ZoneConfig;
use tracing::info;

/// Both artifacts of one scan: the untouched reconstruction and the
/// registered stack.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub raw: Array3<u16>,
    pub registered: RegisteredVolume,
}

/// Reconstruct the registered volume from a completed acquisition.
///
/// `correction` is the per-zone-count column calibration when one exists;
/// without it the planes register uncorrected.
pub fn reconstruct(
    volume: &ReconstructionVolume,
    zones: &[ZoneConfig],
    sensor_rows: usize,
    correction: Option<&ColumnCorrection>,
) -> ScanResult<PipelineOutput> {
    let total_rows = volume.expected_rows();

    let mut planes = Vec::with_capacity(zones.len());
    for (plane, zone) in volume.planes().iter().zip(zones) {
        let cropped = crop_to_overlap(plane, zone, total_rows, sensor_rows)?;
        planes.push(cropped.mapv(f64::from));
    }

    if let Some(correction) = correction {
        apply_column_correction(&mut planes, correction);
    }

    let shifts = register_planes(&mut planes);
    for record in &shifts {
        info!(
            "Pair ({}, {}): row shift {}, col shift {}",
            record.plane_a, record.plane_b, record.row_shift, record.col_shift
        );
    }

    let registered = assemble(&planes, shifts);
    info!(
        "Registered volume: {} planes of {} x {}",
        registered.stack.dim().0,
        registered.stack.dim().1,
        registered.stack.dim().2
    );

    Ok(PipelineOutput {
        raw: volume.to_stack(),
        registered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::ZoneDemultiplexer;
    use ndarray::Array2;
    use shared::camera_interface::RawFrame;

    // Two zones on a 40-row sensor, 120 grabs: overlap lengths 40 and 56.
    fn two_zone_volume() -> (Vec<ZoneConfig>, ReconstructionVolume) {
        let zones = vec![ZoneConfig::new(0, 0, 4), ZoneConfig::new(1, 8, 4)];
        let mut demux = ZoneDemultiplexer::new(&zones, 120, 16);

        for row in 0..120 {
            let data = Array2::from_shape_fn((2, 16), |(zone, x)| {
                ((row + zones[zone].offset) * 10 + x) as u16
            });
            demux.ingest(&RawFrame::new(data, 1).unwrap(), row).unwrap();
        }
        (zones, demux.finish())
    }

    #[test]
    fn test_reconstruct_shapes_and_raw_passthrough() {
        let (zones, volume) = two_zone_volume();
        let output = reconstruct(&volume, &zones, 40, None).unwrap();

        assert_eq!(output.raw.dim(), (2, 120, 16));
        // Zone planes image the same specimen rows after the crop, so the
        // registered stack keeps the shorter plane's full extent.
        assert_eq!(output.registered.stack.dim().0, 2);
        assert_eq!(output.registered.stack.dim().1, 40);
        assert_eq!(output.registered.shifts.len(), 1);
        assert_eq!(output.registered.shifts[0].row_shift, 0);
    }

    #[test]
    fn test_flat_correction_leaves_registration_unchanged() {
        let (zones, volume) = two_zone_volume();
        let correction = ColumnCorrection::new(vec![vec![1.0; 16], vec![1.0; 16]]);

        let plain = reconstruct(&volume, &zones, 40, None).unwrap();
        let corrected = reconstruct(&volume, &zones, 40, Some(&correction)).unwrap();

        assert_eq!(plain.registered.stack, corrected.registered.stack);
    }

    #[test]
    fn test_empty_overlap_propagates() {
        let zones = vec![ZoneConfig::new(0, 0, 4)];
        let demux = ZoneDemultiplexer::new(&zones, 60, 8);
        let volume = demux.finish();

        assert!(reconstruct(&volume, &zones, 40, None).is_err());
    }
}

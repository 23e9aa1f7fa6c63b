//! Zone demultiplexer: raw grab stream to per-zone planes.
//!
//! Plane buffers are preallocated to the expected row count before the scan
//! starts; `ingest` only assigns into existing rows, so the grab loop never
//! allocates.

use crate::error::{ScanError, ScanResult};
use ndarray::{Array2, Array3, Axis};
use shared::camera_interface::RawFrame;
use shared::zone::ZoneConfig;

/// The per-zone planes reconstructed from one scan, with the acquisition
/// counters the session summary reports.
#[derive(Debug, Clone)]
pub struct ReconstructionVolume {
    planes: Vec<Array2<u16>>,
    expected_rows: usize,
    recorded_rows: usize,
    degraded_frames: usize,
}

impl ReconstructionVolume {
    pub fn planes(&self) -> &[Array2<u16>] {
        &self.planes
    }

    pub fn into_planes(self) -> Vec<Array2<u16>> {
        self.planes
    }

    pub fn expected_rows(&self) -> usize {
        self.expected_rows
    }

    /// Rows actually written by good grabs.
    pub fn recorded_rows(&self) -> usize {
        self.recorded_rows
    }

    /// Grabs the hardware completed without usable data. Those rows stay at
    /// their preallocated zero value.
    pub fn degraded_frames(&self) -> usize {
        self.degraded_frames
    }

    /// The raw planes as one (zone, row, col) volume.
    pub fn to_stack(&self) -> Array3<u16> {
        let (rows, cols) = self.planes[0].dim();
        let mut stack = Array3::zeros((self.planes.len(), rows, cols));
        for (zone, plane) in self.planes.iter().enumerate() {
            stack.index_axis_mut(Axis(0), zone).assign(plane);
        }
        stack
    }
}

/// Splits each [`RawFrame`] into its embedded zone rows and writes them
/// into the preallocated planes.
pub struct ZoneDemultiplexer {
    volume: ReconstructionVolume,
    zone_count: usize,
}

impl ZoneDemultiplexer {
    pub fn new(zones: &[ZoneConfig], expected_rows: usize, width: usize) -> Self {
        let planes = zones
            .iter()
            .map(|_| Array2::zeros((expected_rows, width)))
            .collect();
        Self {
            volume: ReconstructionVolume {
                planes,
                expected_rows,
                recorded_rows: 0,
                degraded_frames: 0,
            },
            zone_count: zones.len(),
        }
    }

    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    /// Write each zone's embedded row of `frame` into `plane[zone][row_index]`.
    pub fn ingest(&mut self, frame: &RawFrame, row_index: usize) -> ScanResult<()> {
        if frame.zone_count() != self.zone_count {
            return Err(ScanError::ZoneCountMismatch {
                expected: self.zone_count,
                got: frame.zone_count(),
            });
        }
        if row_index >= self.volume.expected_rows {
            return Err(ScanError::RowIndexOutOfRange {
                row_index,
                expected_rows: self.volume.expected_rows,
            });
        }

        for (zone, plane) in self.volume.planes.iter_mut().enumerate() {
            plane.row_mut(row_index).assign(&frame.zone_row(zone));
        }
        self.volume.recorded_rows += 1;
        Ok(())
    }

    /// Record a grab that completed without usable data. The row is left
    /// unwritten and the scan continues.
    pub fn record_degraded(&mut self) {
        self.volume.degraded_frames += 1;
    }

    pub fn finish(self) -> ReconstructionVolume {
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::zone::ZoneConfig;

    fn three_zones() -> Vec<ZoneConfig> {
        vec![
            ZoneConfig::new(0, 0, 4),
            ZoneConfig::new(1, 96, 4),
            ZoneConfig::new(2, 192, 4),
        ]
    }

    fn constant_frame(values: &[u16], width: usize) -> RawFrame {
        let data = Array2::from_shape_fn((values.len(), width), |(z, _)| values[z]);
        RawFrame::new(data, 1).unwrap()
    }

    #[test]
    fn test_constant_values_round_trip() {
        let zones = three_zones();
        let mut demux = ZoneDemultiplexer::new(&zones, 10, 6);

        for row in 0..10 {
            demux
                .ingest(&constant_frame(&[100, 200, 300], 6), row)
                .unwrap();
        }

        let volume = demux.finish();
        assert_eq!(volume.recorded_rows(), 10);
        for (zone, expected) in [100u16, 200, 300].iter().enumerate() {
            assert!(volume.planes()[zone].iter().all(|&v| v == *expected));
        }
    }

    #[test]
    fn test_zone_count_mismatch_is_fatal() {
        let zones = three_zones();
        let mut demux = ZoneDemultiplexer::new(&zones, 10, 6);

        let result = demux.ingest(&constant_frame(&[1, 2], 6), 0);
        assert!(matches!(
            result,
            Err(ScanError::ZoneCountMismatch {
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn test_row_overflow_is_fatal() {
        let zones = three_zones();
        let mut demux = ZoneDemultiplexer::new(&zones, 4, 6);

        let result = demux.ingest(&constant_frame(&[1, 2, 3], 6), 4);
        assert!(matches!(result, Err(ScanError::RowIndexOutOfRange { .. })));
    }

    #[test]
    fn test_degraded_frames_counted_and_rows_skipped() {
        let zones = three_zones();
        let mut demux = ZoneDemultiplexer::new(&zones, 5, 4);

        demux.ingest(&constant_frame(&[7, 8, 9], 4), 0).unwrap();
        demux.record_degraded();
        demux.ingest(&constant_frame(&[7, 8, 9], 4), 2).unwrap();

        let volume = demux.finish();
        assert_eq!(volume.recorded_rows(), 2);
        assert_eq!(volume.degraded_frames(), 1);
        // The skipped row keeps its preallocated zeros.
        assert!(volume.planes()[0].row(1).iter().all(|&v| v == 0));
        assert!(volume.planes()[0].row(2).iter().all(|&v| v == 7));
    }

    #[test]
    fn test_to_stack_orders_zones() {
        let zones = three_zones();
        let mut demux = ZoneDemultiplexer::new(&zones, 2, 3);
        demux.ingest(&constant_frame(&[10, 20, 30], 3), 0).unwrap();
        demux.ingest(&constant_frame(&[10, 20, 30], 3), 1).unwrap();

        let stack = demux.finish().to_stack();
        assert_eq!(stack.dim(), (3, 2, 3));
        assert_eq!(stack[[0, 0, 0]], 10);
        assert_eq!(stack[[2, 1, 2]], 30);
    }
}

//! Overlap cropping.
//!
//! A zone at sensor row `offset` starts imaging the specimen `sensor_rows -
//! offset` grabs after the deepest possible zone would, and stops the same
//! margin early. Discarding that margin from both ends of a reconstructed
//! plane leaves exactly the rows every zone captured at steady scan
//! velocity, all starting at the same physical specimen row.

use crate::error::{ScanError, ScanResult};
use ndarray::{s, Array2};
use shared::zone::ZoneConfig;

/// Rows a zone's plane keeps for a scan of `total_rows` grabs.
pub fn overlap_len(zone: &ZoneConfig, total_rows: usize, sensor_rows: usize) -> usize {
    let margin = sensor_rows - zone.offset;
    total_rows.saturating_sub(2 * margin)
}

/// Crop one reconstructed plane to its valid overlap window
/// `[sensor_rows - offset, total_rows - (sensor_rows - offset))`.
///
/// An empty window means the zone's offset is incompatible with the scan
/// length, a configuration error caught before the next run, never retried.
pub fn crop_to_overlap(
    plane: &Array2<u16>,
    zone: &ZoneConfig,
    total_rows: usize,
    sensor_rows: usize,
) -> ScanResult<Array2<u16>> {
    let margin = sensor_rows - zone.offset;
    if overlap_len(zone, total_rows, sensor_rows) == 0 {
        return Err(ScanError::EmptyOverlap {
            zone: zone.id,
            offset: zone.offset,
            total_rows,
            sensor_rows,
        });
    }

    Ok(plane.slice(s![margin..total_rows - margin, ..]).to_owned())
}

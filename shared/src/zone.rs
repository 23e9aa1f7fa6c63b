//! Sensor zone geometry.
//!
//! The sensor exposes up to eight "ROI zones": narrow row bands that each
//! behave as an independent virtual line-scan channel. A zone is addressed
//! by its row offset on the sensor; the hardware only accepts offsets
//! divisible by the minimum band height.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum addressable row granularity of the zone hardware. Zone offsets
/// and band heights must be multiples of this value.
pub const ZONE_ROW_QUANTUM: usize = 4;

/// Maximum number of zones the sensor supports.
pub const MAX_ZONES: usize = 8;

/// One configured sensor zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone index, 0-based, matching the hardware zone selector.
    pub id: usize,
    /// Sensor row address of the zone band.
    pub offset: usize,
    /// Band height in rows (4 on the observed hardware).
    pub size: usize,
}

impl ZoneConfig {
    pub fn new(id: usize, offset: usize, size: usize) -> Self {
        Self { id, offset, size }
    }

    /// First sensor row past the end of the band.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Invalid zone offset/size combinations, detected before any motion starts.
#[derive(Error, Debug)]
pub enum ZoneLayoutError {
    #[error("requested zone count {0} is outside the hardware range 1..={MAX_ZONES}")]
    UnsupportedZoneCount(usize),

    #[error("zone {id} offset {offset} is not divisible by the row quantum {ZONE_ROW_QUANTUM}")]
    MisalignedOffset { id: usize, offset: usize },

    #[error("zone {id} band [{offset}, {end}) exceeds sensor height {sensor_rows}")]
    OutOfBounds {
        id: usize,
        offset: usize,
        end: usize,
        sensor_rows: usize,
    },

    #[error("zone offsets must be strictly increasing (violated at zone {id})")]
    UnorderedOffsets { id: usize },
}

/// Build an evenly-spaced zone layout across the sensor height.
///
/// Mirrors the vendor spacing rule: bands are spread so the first zone sits
/// at row 0 and the last at the bottom of the sensor, with each offset
/// rounded down to the hardware quantum. A single zone degenerates to one
/// band centered on the sensor.
pub fn evenly_spaced(zone_count: usize, sensor_rows: usize) -> Result<Vec<ZoneConfig>, ZoneLayoutError> {
    if zone_count == 0 || zone_count > MAX_ZONES {
        return Err(ZoneLayoutError::UnsupportedZoneCount(zone_count));
    }

    let size = ZONE_ROW_QUANTUM;

    if zone_count == 1 {
        let offset = quantize_down(sensor_rows / 2);
        let zones = vec![ZoneConfig::new(0, offset, size)];
        validate(&zones, sensor_rows)?;
        return Ok(zones);
    }

    let spacing = (sensor_rows - size) / (zone_count - 1);
    let zones: Vec<ZoneConfig> = (0..zone_count)
        .map(|i| ZoneConfig::new(i, quantize_down(i * spacing), size))
        .collect();

    validate(&zones, sensor_rows)?;
    Ok(zones)
}

/// Check an explicit layout against the hardware constraints.
pub fn validate(zones: &[ZoneConfig], sensor_rows: usize) -> Result<(), ZoneLayoutError> {
    if zones.is_empty() || zones.len() > MAX_ZONES {
        return Err(ZoneLayoutError::UnsupportedZoneCount(zones.len()));
    }

    let mut previous: Option<usize> = None;
    for zone in zones {
        if zone.offset % ZONE_ROW_QUANTUM != 0 {
            return Err(ZoneLayoutError::MisalignedOffset {
                id: zone.id,
                offset: zone.offset,
            });
        }
        if zone.end() > sensor_rows {
            return Err(ZoneLayoutError::OutOfBounds {
                id: zone.id,
                offset: zone.offset,
                end: zone.end(),
                sensor_rows,
            });
        }
        if let Some(prev) = previous {
            if zone.offset <= prev {
                return Err(ZoneLayoutError::UnorderedOffsets { id: zone.id });
            }
        }
        previous = Some(zone.offset);
    }

    Ok(())
}

fn quantize_down(offset: usize) -> usize {
    offset - offset % ZONE_ROW_QUANTUM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evenly_spaced_full_sensor() {
        // 1544-row sensor, 3 zones: spacing trunc(1540 / 2) = 770, offsets
        // rounded down to the quantum.
        let zones = evenly_spaced(3, 1544).unwrap();
        let offsets: Vec<usize> = zones.iter().map(|z| z.offset).collect();
        assert_eq!(offsets, vec![0, 768, 1540]);
        assert!(zones.iter().all(|z| z.size == ZONE_ROW_QUANTUM));
    }

    #[test]
    fn test_evenly_spaced_offsets_quantized_and_ordered() {
        for count in 2..=7 {
            let zones = evenly_spaced(count, 1544).unwrap();
            assert_eq!(zones.len(), count);
            for pair in zones.windows(2) {
                assert!(pair[0].offset < pair[1].offset);
            }
            for zone in &zones {
                assert_eq!(zone.offset % ZONE_ROW_QUANTUM, 0);
                assert!(zone.end() <= 1544);
            }
        }
    }

    #[test]
    fn test_single_zone_centered() {
        let zones = evenly_spaced(1, 1544).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].offset, 772);
    }

    #[test]
    fn test_unsupported_zone_counts() {
        assert!(evenly_spaced(0, 1544).is_err());
        assert!(evenly_spaced(9, 1544).is_err());
    }

    #[test]
    fn test_validate_rejects_misaligned_offset() {
        let zones = vec![
            ZoneConfig::new(0, 0, 4),
            ZoneConfig::new(1, 98, 4),
        ];
        assert!(matches!(
            validate(&zones, 200),
            Err(ZoneLayoutError::MisalignedOffset { id: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_band() {
        let zones = vec![ZoneConfig::new(0, 200, 4)];
        assert!(matches!(
            validate(&zones, 200),
            Err(ZoneLayoutError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unordered_offsets() {
        let zones = vec![
            ZoneConfig::new(0, 96, 4),
            ZoneConfig::new(1, 0, 4),
        ];
        assert!(matches!(
            validate(&zones, 200),
            Err(ZoneLayoutError::UnorderedOffsets { id: 1 })
        ));
    }

    #[test]
    fn test_explicit_fixture_layout_is_valid() {
        let zones = vec![
            ZoneConfig::new(0, 0, 4),
            ZoneConfig::new(1, 96, 4),
            ZoneConfig::new(2, 192, 4),
        ];
        assert!(validate(&zones, 200).is_ok());
    }
}

//! Synthetic zone camera for dry runs.
//!
//! Models the acquisition geometry exactly: each grab advances a virtual
//! stage by one pixel pitch, and every configured zone images the specimen
//! row sitting under its band at that instant. Running the full pipeline
//! against this camera reproduces each zone's view of the same specimen,
//! displaced by the zone offsets, which is what registration undoes.

use ndarray::Array2;
use shared::camera_interface::{
    CameraError, CameraResult, Grab, RawFrame, SensorGeometry, TriggerEdge, TriggerSource,
    ZoneCamera,
};
use shared::zone::ZoneConfig;
use std::time::Duration;

const DEFAULT_EXPOSURE: Duration = Duration::from_micros(50);

/// Zone camera backed by an in-memory specimen image.
pub struct SimulatedZoneCamera {
    geometry: SensorGeometry,
    specimen: Array2<u16>,
    zones: Vec<ZoneConfig>,
    /// Per-zone row displacement added on top of the zone offset, for
    /// exercising registration against a known misalignment.
    zone_jitter: Vec<isize>,
    exposure: Duration,
    grab_index: usize,
    armed: bool,
}

impl SimulatedZoneCamera {
    /// Camera over a smooth synthetic specimen twice the sensor height.
    pub fn new(geometry: SensorGeometry) -> Self {
        let rows = geometry.height_pix * 2;
        let specimen = Array2::from_shape_fn((rows, geometry.width_pix), |(y, x)| {
            let wave = (y as f64 / 37.0).sin() * (x as f64 / 53.0).cos();
            (2000.0 + 1500.0 * wave) as u16
        });
        Self::with_specimen(geometry, specimen)
    }

    /// Camera over a caller-supplied specimen. The specimen width must
    /// match the sensor readout width.
    pub fn with_specimen(geometry: SensorGeometry, specimen: Array2<u16>) -> Self {
        debug_assert_eq!(specimen.ncols(), geometry.width_pix);
        Self {
            geometry,
            specimen,
            zones: Vec::new(),
            zone_jitter: Vec::new(),
            exposure: DEFAULT_EXPOSURE,
            grab_index: 0,
            armed: false,
        }
    }

    /// Displace each zone's sampling position by a fixed row count.
    pub fn with_zone_jitter(mut self, jitter: Vec<isize>) -> Self {
        self.zone_jitter = jitter;
        self
    }

    fn specimen_row(&self, zone_index: usize, band_row: usize) -> usize {
        let offset = self.zones[zone_index].offset as isize;
        let jitter = self.zone_jitter.get(zone_index).copied().unwrap_or(0);
        let row = self.grab_index as isize + offset + jitter + band_row as isize;
        row.clamp(0, self.specimen.nrows() as isize - 1) as usize
    }
}

impl ZoneCamera for SimulatedZoneCamera {
    fn geometry(&self) -> SensorGeometry {
        self.geometry
    }

    fn configure_zones(&mut self, zones: &[ZoneConfig]) -> CameraResult<()> {
        if zones.is_empty() {
            return Err(CameraError::Config("no zones configured".to_string()));
        }
        self.zones = zones.to_vec();
        self.grab_index = 0;
        Ok(())
    }

    fn arm_trigger(&mut self, _source: TriggerSource, _edge: TriggerEdge) -> CameraResult<()> {
        self.armed = true;
        Ok(())
    }

    fn exposure(&self) -> Duration {
        self.exposure
    }

    fn set_exposure(&mut self, exposure: Duration) -> CameraResult<()> {
        self.exposure = exposure;
        Ok(())
    }

    fn grab_next(&mut self, _timeout: Duration) -> CameraResult<Grab> {
        if self.zones.is_empty() || !self.armed {
            return Err(CameraError::Config(
                "grab before zone configuration and trigger arm".to_string(),
            ));
        }

        let rows_per_zone = self.zones[0].size;
        let width = self.geometry.width_pix;
        let mut data = Array2::zeros((self.zones.len() * rows_per_zone, width));
        for (zone_index, _) in self.zones.iter().enumerate() {
            for band_row in 0..rows_per_zone {
                let source = self.specimen.row(self.specimen_row(zone_index, band_row));
                data.row_mut(zone_index * rows_per_zone + band_row)
                    .assign(&source);
            }
        }

        self.grab_index += 1;
        Ok(Grab::Frame(RawFrame::new(data, rows_per_zone)?))
    }

    fn stop(&mut self) -> CameraResult<()> {
        self.armed = false;
        Ok(())
    }

    fn close(&mut self) -> CameraResult<()> {
        self.zones.clear();
        self.armed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::zone::evenly_spaced;

    fn ramp_specimen(rows: usize, cols: usize) -> Array2<u16> {
        Array2::from_shape_fn((rows, cols), |(y, _)| y as u16)
    }

    fn arm(camera: &mut SimulatedZoneCamera, zones: &[ZoneConfig]) {
        camera.configure_zones(zones).unwrap();
        camera
            .arm_trigger(TriggerSource::Software, TriggerEdge::Rising)
            .unwrap();
    }

    #[test]
    fn test_each_zone_images_its_offset_row() {
        let geometry = SensorGeometry::new(16, 200, 0.35e-3, 635.0);
        let zones = evenly_spaced(3, 200).unwrap();
        let mut camera =
            SimulatedZoneCamera::with_specimen(geometry, ramp_specimen(600, 16));
        arm(&mut camera, &zones);

        let frame = match camera.grab_next(Duration::from_millis(10)).unwrap() {
            Grab::Frame(frame) => frame,
            other => panic!("expected frame, got {other:?}"),
        };

        assert_eq!(frame.zone_count(), 3);
        // Grab 0: zone i reads specimen row offset_i.
        assert_eq!(frame.zone_row(0)[0], zones[0].offset as u16);
        assert_eq!(frame.zone_row(1)[0], zones[1].offset as u16);
        assert_eq!(frame.zone_row(2)[0], zones[2].offset as u16);
    }

    #[test]
    fn test_grabs_advance_one_row() {
        let geometry = SensorGeometry::new(8, 200, 0.35e-3, 635.0);
        let zones = evenly_spaced(2, 200).unwrap();
        let mut camera =
            SimulatedZoneCamera::with_specimen(geometry, ramp_specimen(600, 8));
        arm(&mut camera, &zones);

        for expected in 0..5u16 {
            let frame = match camera.grab_next(Duration::from_millis(10)).unwrap() {
                Grab::Frame(frame) => frame,
                other => panic!("expected frame, got {other:?}"),
            };
            assert_eq!(frame.zone_row(0)[0], expected);
        }
    }

    #[test]
    fn test_jitter_displaces_a_zone() {
        let geometry = SensorGeometry::new(8, 200, 0.35e-3, 635.0);
        let zones = evenly_spaced(2, 200).unwrap();
        let mut camera = SimulatedZoneCamera::with_specimen(geometry, ramp_specimen(600, 8))
            .with_zone_jitter(vec![0, 3]);
        arm(&mut camera, &zones);

        let frame = match camera.grab_next(Duration::from_millis(10)).unwrap() {
            Grab::Frame(frame) => frame,
            other => panic!("expected frame, got {other:?}"),
        };
        assert_eq!(frame.zone_row(1)[0], zones[1].offset as u16 + 3);
    }

    #[test]
    fn test_grab_before_configuration_fails() {
        let mut camera = SimulatedZoneCamera::new(SensorGeometry::new(8, 200, 0.35e-3, 635.0));
        assert!(camera.grab_next(Duration::from_millis(10)).is_err());
    }
}

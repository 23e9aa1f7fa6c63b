//! Camera abstraction for zone-based line-scan acquisition.
//!
//! Provides a unified interface for the multi-zone area sensor that can be
//! backed by vendor hardware, the dry-run simulator, or scripted mocks in
//! tests. The consumer only ever sees [`RawFrame`]s: one grab's worth of
//! zone rows, retrieved with a bounded wait.

pub mod mock;

use crate::zone::ZoneConfig;
use ndarray::{Array2, ArrayView1};
use std::time::Duration;
use thiserror::Error;

/// Fixed geometry of the physical sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorGeometry {
    /// Readout width in pixels.
    pub width_pix: usize,
    /// Full sensor height in rows. This is also the maximum addressable
    /// zone offset plus band height.
    pub height_pix: usize,
    /// Pixel pitch in millimeters.
    pub pixel_size_mm: f64,
    /// Frame rate ceiling at minimum readout height.
    pub max_fps: f64,
}

impl SensorGeometry {
    pub const fn new(width_pix: usize, height_pix: usize, pixel_size_mm: f64, max_fps: f64) -> Self {
        Self {
            width_pix,
            height_pix,
            pixel_size_mm,
            max_fps,
        }
    }

    /// Geometry of the ACA2040-class sensor on the instrument.
    /// Pixel pitch as measured at the specimen plane.
    pub const fn aca2040() -> Self {
        Self::new(2064, 1544, 0.35e-3, 635.0)
    }

    /// Field-of-view height in millimeters at the specimen plane.
    pub fn fov_height_mm(&self) -> f64 {
        self.height_pix as f64 * self.pixel_size_mm
    }
}

/// Error type for camera operations.
#[derive(Error, Debug)]
pub enum CameraError {
    /// Grab deadline elapsed before a frame arrived. Retryable up to the
    /// session's bounded retry count.
    #[error("grab timed out after {0:?}")]
    Timeout(Duration),

    /// Hardware or driver failure. Fatal to the session.
    #[error("camera hardware error: {0}")]
    Hardware(String),

    /// Invalid zone or trigger configuration.
    #[error("camera configuration error: {0}")]
    Config(String),
}

pub type CameraResult<T> = Result<T, CameraError>;

/// Trigger signal source for frame acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Opto-isolated input line, pulsed by the stage encoder.
    Line(u8),
    /// Free-running software trigger, used by simulators.
    Software,
}

/// Signal edge that fires the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEdge {
    Rising,
    Falling,
}

/// One camera grab result.
///
/// Contains `zone_count * rows_per_zone` sensor rows in zone order: the
/// hardware reads out each zone's band contiguously, lowest offset first.
/// Only the first row of each band carries the line-scan sample.
#[derive(Debug, Clone)]
pub struct RawFrame {
    data: Array2<u16>,
    rows_per_zone: usize,
}

impl RawFrame {
    pub fn new(data: Array2<u16>, rows_per_zone: usize) -> CameraResult<Self> {
        if rows_per_zone == 0 {
            return Err(CameraError::Config("rows_per_zone must be nonzero".to_string()));
        }
        if data.nrows() == 0 || data.nrows() % rows_per_zone != 0 {
            return Err(CameraError::Config(format!(
                "frame with {} rows is not divisible into {}-row zone bands",
                data.nrows(),
                rows_per_zone
            )));
        }
        Ok(Self { data, rows_per_zone })
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn zone_count(&self) -> usize {
        self.data.nrows() / self.rows_per_zone
    }

    /// The line-scan row embedded for `zone`: the first row of its band.
    pub fn zone_row(&self, zone: usize) -> ArrayView1<'_, u16> {
        self.data.row(zone * self.rows_per_zone)
    }
}

/// Outcome of a completed retrieval.
///
/// The hardware can report a grab that finished but carries no usable
/// image data (transfer error, buffer underrun). Such degraded grabs are
/// counted by the session and skipped, never fatal.
#[derive(Debug, Clone)]
pub enum Grab {
    Frame(RawFrame),
    Degraded { error_code: u32, description: String },
}

/// Trait for unified zone camera access.
///
/// Implemented by the vendor-backed adapter, the dry-run simulator, and the
/// scripted mock, so the orchestrator and tests share one code path.
pub trait ZoneCamera: Send {
    fn geometry(&self) -> SensorGeometry;

    /// Apply a zone layout to the sensor. Replaces any previous layout;
    /// settings persist in camera memory until reset.
    fn configure_zones(&mut self, zones: &[ZoneConfig]) -> CameraResult<()>;

    /// Arm the frame trigger.
    fn arm_trigger(&mut self, source: TriggerSource, edge: TriggerEdge) -> CameraResult<()>;

    fn exposure(&self) -> Duration;

    fn set_exposure(&mut self, exposure: Duration) -> CameraResult<()>;

    /// Retrieve the next frame, blocking at most `timeout`.
    ///
    /// The timeout must be strictly greater than the exposure time or every
    /// retrieval would expire before the sensor finishes integrating.
    fn grab_next(&mut self, timeout: Duration) -> CameraResult<Grab>;

    /// Stop the acquisition stream without releasing the device.
    fn stop(&mut self) -> CameraResult<()>;

    /// Release the device. Disarms triggering and resets zone state.
    fn close(&mut self) -> CameraResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_raw_frame_zone_rows() {
        // 3 zones, 4-row bands: 12 rows total, zone i's line is row i*4.
        let data = Array2::from_shape_fn((12, 8), |(r, _)| r as u16);
        let frame = RawFrame::new(data, 4).unwrap();

        assert_eq!(frame.zone_count(), 3);
        assert_eq!(frame.width(), 8);
        assert_eq!(frame.zone_row(0)[0], 0);
        assert_eq!(frame.zone_row(1)[0], 4);
        assert_eq!(frame.zone_row(2)[0], 8);
    }

    #[test]
    fn test_raw_frame_single_row_bands() {
        let data = Array2::from_shape_fn((5, 4), |(r, _)| (r * 10) as u16);
        let frame = RawFrame::new(data, 1).unwrap();

        assert_eq!(frame.zone_count(), 5);
        assert_eq!(frame.zone_row(3)[0], 30);
    }

    #[test]
    fn test_raw_frame_rejects_ragged_bands() {
        let data = Array2::<u16>::zeros((10, 4));
        assert!(RawFrame::new(data, 4).is_err());
    }

    #[test]
    fn test_raw_frame_rejects_zero_band_height() {
        let data = Array2::<u16>::zeros((4, 4));
        assert!(RawFrame::new(data, 0).is_err());
    }

    #[test]
    fn test_fov_height() {
        let geometry = SensorGeometry::aca2040();
        let fov = geometry.fov_height_mm();
        assert!((fov - 1544.0 * 0.35e-3).abs() < 1e-12);
    }
}

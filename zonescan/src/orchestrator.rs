//! Scan session orchestration.
//!
//! Owns the stage and camera handles for the duration of one session and
//! sequences them through `Idle → Armed → Scanning → Draining → Complete`,
//! with `Failed` reachable from anywhere. The orchestrator thread owns the
//! grab loop and the plane buffers exclusively; stage motion is autonomous
//! and only polled outside the per-row loop. Whatever happens, both device
//! handles are closed exactly once.

use crate::demux::{ReconstructionVolume, ZoneDemultiplexer};
use crate::error::{ScanError, ScanResult};
use crate::overlap::overlap_len;
use shared::camera_interface::{
    CameraError, Grab, SensorGeometry, TriggerEdge, TriggerSource, ZoneCamera,
};
use shared::scan_params::ScanParameters;
use shared::stage_interface::{Axis, Stage};
use shared::zone::{evenly_spaced, ZoneConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A 3rd consecutive timeout fails the session.
const MAX_CONSECUTIVE_TIMEOUTS: usize = 3;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Armed,
    Scanning,
    Draining,
    Complete,
    Failed,
}

/// Everything a session needs to know up front. Derived quantities (scan
/// range, row count, trigger pitch) come from the sensor geometry.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub zone_count: usize,
    /// Number of sensor fields of view the scan sweeps past the midpoint.
    pub overlap_factor: usize,
    /// Scan midpoint (x, y) in millimeters, x being the scan axis.
    pub scan_midpoint_mm: (f64, f64),
    pub scan_velocity_mm_per_s: f64,
    /// Velocity for the pre-scan reposition move.
    pub reposition_velocity_mm_per_s: f64,
    pub exposure: Duration,
    /// Grab deadline; must be strictly greater than the exposure.
    pub grab_timeout: Duration,
    pub trigger_source: TriggerSource,
    pub trigger_edge: TriggerEdge,
}

impl ScanConfig {
    pub fn scan_range_mm(&self, geometry: &SensorGeometry) -> f64 {
        self.overlap_factor as f64 * geometry.fov_height_mm()
    }

    /// Grabs per scan: one sensor height of lead-in plus one per swept row.
    pub fn total_rows(&self, geometry: &SensorGeometry) -> usize {
        geometry.height_pix * (self.overlap_factor + 1)
    }

    /// Scan start position: half the range plus half a field of view
    /// before the midpoint, so the sweep is symmetric about it.
    pub fn scan_start_mm(&self, geometry: &SensorGeometry) -> f64 {
        self.scan_midpoint_mm.0
            - self.scan_range_mm(geometry) / 2.0
            - geometry.fov_height_mm() / 2.0
    }

    /// Encoder counts between trigger pulses: one pixel pitch at the
    /// controller's 10 nm count resolution.
    pub fn encoder_divisor(&self, geometry: &SensorGeometry) -> f64 {
        geometry.pixel_size_mm * 1e5
    }

    /// The flat parameter record persisted next to the output volumes.
    pub fn scan_parameters(&self, geometry: &SensorGeometry) -> ScanParameters {
        ScanParameters {
            zone_count: self.zone_count,
            overlap_factor: self.overlap_factor,
            scan_midpoint_mm: self.scan_midpoint_mm,
            scan_range_mm: self.scan_range_mm(geometry),
            scan_velocity_mm_per_s: self.scan_velocity_mm_per_s,
            exposure_time_us: self.exposure.as_secs_f64() * 1e6,
            pixel_size_mm: geometry.pixel_size_mm,
        }
    }
}

/// Final counts reported by every completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub requested_rows: usize,
    pub recorded_rows: usize,
    pub degraded_frames: usize,
    pub cancelled: bool,
}

/// A completed acquisition, ready for the reconstruction pipeline.
pub struct ScanOutcome {
    pub volume: ReconstructionVolume,
    pub zones: Vec<ZoneConfig>,
    pub summary: SessionSummary,
}

/// One scan session over exclusively-owned device handles.
pub struct ScanOrchestrator {
    stage: Box<dyn Stage>,
    camera: Box<dyn ZoneCamera>,
    config: ScanConfig,
    state: ScanState,
    stop: Arc<AtomicBool>,
    stage_closed: bool,
    camera_closed: bool,
}

impl ScanOrchestrator {
    pub fn new(stage: Box<dyn Stage>, camera: Box<dyn ZoneCamera>, config: ScanConfig) -> Self {
        Self {
            stage,
            camera,
            config,
            state: ScanState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            stage_closed: false,
            camera_closed: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Handle an external caller can set to cancel the session. The grab
    /// loop stops after the in-flight retrieval and cleanup still runs.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the session to completion. Consumes the orchestrator; the device
    /// handles are closed on every exit path.
    pub fn run(mut self) -> ScanResult<ScanOutcome> {
        let result = self.execute();
        if result.is_err() {
            self.state = ScanState::Failed;
        }
        self.shutdown(result.is_err());
        result
    }

    fn execute(&mut self) -> ScanResult<ScanOutcome> {
        let geometry = self.camera.geometry();
        let zones = self.validate(&geometry)?;
        let total_rows = self.config.total_rows(&geometry);

        self.arm(&zones)?;
        let (volume, cancelled) = self.scan(&zones, total_rows, geometry.width_pix)?;
        self.drain(cancelled)?;

        self.state = ScanState::Complete;
        let summary = SessionSummary {
            requested_rows: total_rows,
            recorded_rows: volume.recorded_rows(),
            degraded_frames: volume.degraded_frames(),
            cancelled,
        };
        info!(
            "Session complete: {} of {} rows recorded, {} degraded{}",
            summary.recorded_rows,
            summary.requested_rows,
            summary.degraded_frames,
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(ScanOutcome {
            volume,
            zones,
            summary,
        })
    }

    /// Configuration checks, all before any motion starts.
    fn validate(&self, geometry: &SensorGeometry) -> ScanResult<Vec<ZoneConfig>> {
        if self.config.grab_timeout <= self.config.exposure {
            return Err(ScanError::Config(format!(
                "grab timeout {:?} must exceed the exposure {:?}",
                self.config.grab_timeout, self.config.exposure
            )));
        }

        let zones = evenly_spaced(self.config.zone_count, geometry.height_pix)?;
        let total_rows = self.config.total_rows(geometry);
        for zone in &zones {
            if overlap_len(zone, total_rows, geometry.height_pix) == 0 {
                return Err(ScanError::EmptyOverlap {
                    zone: zone.id,
                    offset: zone.offset,
                    total_rows,
                    sensor_rows: geometry.height_pix,
                });
            }
        }
        Ok(zones)
    }

    fn arm(&mut self, zones: &[ZoneConfig]) -> ScanResult<()> {
        info!("Arming: repositioning to scan midpoint");
        let reposition = self.config.reposition_velocity_mm_per_s;
        self.stage.set_velocity(Axis::X, reposition)?;
        self.stage.set_velocity(Axis::Y, reposition)?;
        self.stage.move_to(Axis::X, self.config.scan_midpoint_mm.0)?;
        self.stage.move_to(Axis::Y, self.config.scan_midpoint_mm.1)?;
        self.stage.wait_until_idle()?;
        self.stage
            .set_velocity(Axis::X, self.config.scan_velocity_mm_per_s)?;

        self.camera.set_exposure(self.config.exposure)?;
        self.camera.configure_zones(zones)?;
        self.camera
            .arm_trigger(self.config.trigger_source, self.config.trigger_edge)?;

        self.state = ScanState::Armed;
        Ok(())
    }

    fn scan(
        &mut self,
        zones: &[ZoneConfig],
        total_rows: usize,
        width: usize,
    ) -> ScanResult<(ReconstructionVolume, bool)> {
        let geometry = self.camera.geometry();
        let start = self.config.scan_start_mm(&geometry);
        let divisor = self.config.encoder_divisor(&geometry);

        self.state = ScanState::Scanning;
        self.stage
            .start_encoder_gated_scan(start, total_rows, divisor)?;
        info!(
            "Scanning: {} rows from {:.4} mm, {} zones",
            total_rows,
            start,
            zones.len()
        );

        let mut demux = ZoneDemultiplexer::new(zones, total_rows, width);
        let mut consecutive_timeouts = 0;
        let mut row = 0;
        let mut cancelled = false;

        while row < total_rows {
            if self.stop.load(Ordering::Relaxed) {
                info!("Stop requested, ending grab loop at row {}", row);
                cancelled = true;
                break;
            }

            match self.camera.grab_next(self.config.grab_timeout) {
                Ok(Grab::Frame(frame)) => {
                    demux.ingest(&frame, row)?;
                    consecutive_timeouts = 0;
                    row += 1;
                }
                Ok(Grab::Degraded {
                    error_code,
                    description,
                }) => {
                    warn!(
                        "Degraded grab at row {} (code {:#x}): {}",
                        row, error_code, description
                    );
                    demux.record_degraded();
                    consecutive_timeouts = 0;
                    row += 1;
                }
                Err(CameraError::Timeout(deadline)) => {
                    consecutive_timeouts += 1;
                    warn!(
                        "Grab timeout at row {} after {:?} ({} consecutive)",
                        row, deadline, consecutive_timeouts
                    );
                    if consecutive_timeouts >= MAX_CONSECUTIVE_TIMEOUTS {
                        return Err(ScanError::GrabRetriesExhausted {
                            attempts: consecutive_timeouts,
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok((demux.finish(), cancelled))
    }

    fn drain(&mut self, cancelled: bool) -> ScanResult<()> {
        self.state = ScanState::Draining;
        self.camera.stop()?;
        if cancelled {
            self.stage.halt()?;
        }
        self.stage.wait_until_idle()?;
        Ok(())
    }

    /// Best-effort cleanup: halt motion on failure and close each handle
    /// exactly once. Close errors are logged, never propagated over the
    /// session result.
    fn shutdown(&mut self, failed: bool) {
        if failed {
            if let Err(e) = self.stage.halt() {
                warn!("Failed to halt stage during cleanup: {}", e);
            }
        }
        if !self.camera_closed {
            self.camera_closed = true;
            if let Err(e) = self.camera.close() {
                warn!("Failed to close camera: {}", e);
            }
        }
        if !self.stage_closed {
            self.stage_closed = true;
            if let Err(e) = self.stage.close() {
                warn!("Failed to close stage: {}", e);
            }
        }
    }
}

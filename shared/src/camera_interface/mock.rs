use super::{
    CameraError, CameraResult, Grab, RawFrame, SensorGeometry, TriggerEdge, TriggerSource,
    ZoneCamera,
};
use crate::zone::ZoneConfig;
use ndarray::Array2;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted retrieval outcome for [`MockZoneCamera`].
#[derive(Debug, Clone)]
pub enum ScriptedGrab {
    /// A good frame with the given row data (`zone_count * rows_per_zone`
    /// rows in zone order).
    Frame(Array2<u16>),
    /// Hardware reports the grab completed without usable data.
    Degraded,
    /// The retrieval deadline expires.
    Timeout,
}

/// Scripted camera for orchestrator and pipeline tests.
///
/// Plays back a fixed sequence of grab outcomes and records configuration
/// calls. The close counter is shared so tests can assert the session
/// closed the handle exactly once even after the camera was moved into the
/// orchestrator.
pub struct MockZoneCamera {
    geometry: SensorGeometry,
    script: VecDeque<ScriptedGrab>,
    rows_per_zone: usize,
    exposure: Duration,
    zones: Option<Vec<ZoneConfig>>,
    trigger: Option<(TriggerSource, TriggerEdge)>,
    stopped: bool,
    close_count: Arc<AtomicUsize>,
}

impl MockZoneCamera {
    pub fn new(geometry: SensorGeometry, script: Vec<ScriptedGrab>, rows_per_zone: usize) -> Self {
        Self {
            geometry,
            script: script.into(),
            rows_per_zone,
            exposure: Duration::from_micros(50),
            zones: None,
            trigger: None,
            stopped: false,
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build a camera that serves the given reconstructed planes back as an
    /// interleaved frame stream: grab `r` contains row `r` of every plane.
    pub fn from_planes(geometry: SensorGeometry, planes: &[Array2<u16>]) -> Self {
        assert!(!planes.is_empty());
        let rows = planes[0].nrows();
        let width = planes[0].ncols();
        assert!(planes.iter().all(|p| p.dim() == (rows, width)));

        let script = (0..rows)
            .map(|r| {
                let mut data = Array2::<u16>::zeros((planes.len(), width));
                for (zone, plane) in planes.iter().enumerate() {
                    data.row_mut(zone).assign(&plane.row(r));
                }
                ScriptedGrab::Frame(data)
            })
            .collect();

        Self::new(geometry, script, 1)
    }

    /// Shared handle to the close-call counter.
    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }

    pub fn configured_zones(&self) -> Option<&[ZoneConfig]> {
        self.zones.as_deref()
    }

    pub fn armed_trigger(&self) -> Option<(TriggerSource, TriggerEdge)> {
        self.trigger
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn remaining_grabs(&self) -> usize {
        self.script.len()
    }
}

impl ZoneCamera for MockZoneCamera {
    fn geometry(&self) -> SensorGeometry {
        self.geometry
    }

    fn configure_zones(&mut self, zones: &[ZoneConfig]) -> CameraResult<()> {
        self.zones = Some(zones.to_vec());
        Ok(())
    }

    fn arm_trigger(&mut self, source: TriggerSource, edge: TriggerEdge) -> CameraResult<()> {
        self.trigger = Some((source, edge));
        Ok(())
    }

    fn exposure(&self) -> Duration {
        self.exposure
    }

    fn set_exposure(&mut self, exposure: Duration) -> CameraResult<()> {
        self.exposure = exposure;
        Ok(())
    }

    fn grab_next(&mut self, timeout: Duration) -> CameraResult<Grab> {
        match self.script.pop_front() {
            Some(ScriptedGrab::Frame(data)) => {
                Ok(Grab::Frame(RawFrame::new(data, self.rows_per_zone)?))
            }
            Some(ScriptedGrab::Degraded) => Ok(Grab::Degraded {
                error_code: 0xE100,
                description: "scripted degraded grab".to_string(),
            }),
            Some(ScriptedGrab::Timeout) => Err(CameraError::Timeout(timeout)),
            None => Err(CameraError::Hardware("mock grab script exhausted".to_string())),
        }
    }

    fn stop(&mut self) -> CameraResult<()> {
        self.stopped = true;
        Ok(())
    }

    fn close(&mut self) -> CameraResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> SensorGeometry {
        SensorGeometry::new(8, 16, 1e-3, 100.0)
    }

    #[test]
    fn test_from_planes_interleaves_rows() {
        let plane_a = Array2::from_elem((4, 8), 100u16);
        let plane_b = Array2::from_elem((4, 8), 200u16);
        let mut camera = MockZoneCamera::from_planes(geometry(), &[plane_a, plane_b]);

        for _ in 0..4 {
            match camera.grab_next(Duration::from_millis(10)).unwrap() {
                Grab::Frame(frame) => {
                    assert_eq!(frame.zone_count(), 2);
                    assert_eq!(frame.zone_row(0)[0], 100);
                    assert_eq!(frame.zone_row(1)[0], 200);
                }
                other => panic!("expected frame, got {other:?}"),
            }
        }
        assert_eq!(camera.remaining_grabs(), 0);
    }

    #[test]
    fn test_scripted_timeout_and_degraded() {
        let mut camera = MockZoneCamera::new(
            geometry(),
            vec![ScriptedGrab::Timeout, ScriptedGrab::Degraded],
            1,
        );

        assert!(matches!(
            camera.grab_next(Duration::from_millis(5)),
            Err(CameraError::Timeout(_))
        ));
        assert!(matches!(
            camera.grab_next(Duration::from_millis(5)).unwrap(),
            Grab::Degraded { .. }
        ));
    }

    #[test]
    fn test_close_counter_shared() {
        let mut camera = MockZoneCamera::new(geometry(), vec![], 1);
        let count = camera.close_count();

        camera.close().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_records_zone_and_trigger_configuration() {
        let mut camera = MockZoneCamera::new(geometry(), vec![], 1);
        let zones = vec![ZoneConfig::new(0, 0, 4), ZoneConfig::new(1, 8, 4)];

        camera.configure_zones(&zones).unwrap();
        camera
            .arm_trigger(TriggerSource::Line(1), TriggerEdge::Rising)
            .unwrap();

        assert_eq!(camera.configured_zones().unwrap().len(), 2);
        assert_eq!(
            camera.armed_trigger(),
            Some((TriggerSource::Line(1), TriggerEdge::Rising))
        );
    }
}

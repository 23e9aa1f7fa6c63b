//! Motorized stage abstraction.
//!
//! The scan orchestrator drives the stage through this trait; the real
//! implementation is the MS-2000 serial driver in the `hardware` crate, and
//! tests use the recording mock. Stage motion is autonomous: once a scan or
//! move command is issued the controller runs it to completion on its own,
//! and the host only polls `is_busy` outside the acquisition hot loop.

pub mod mock;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Stage translation axes. `F` is the focus drive on controllers that
/// expose one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
    F,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
            Axis::F => write!(f, "F"),
        }
    }
}

/// Error type for stage operations.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("controller rejected command: {0}")]
    CommandFailed(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("stage hardware error: {0}")]
    Hardware(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait for unified stage control.
pub trait Stage: Send {
    /// Absolute move of one axis, in millimeters.
    fn move_to(&mut self, axis: Axis, position_mm: f64) -> StageResult<()>;

    /// Set the motor velocity of one axis, in mm/s.
    fn set_velocity(&mut self, axis: Axis, mm_per_s: f64) -> StageResult<()>;

    /// Arm and start an encoder-gated scan: the stage ramps to constant
    /// velocity at `start_mm` and emits `pixel_count` trigger pulses, one
    /// per `encoder_divisor` encoder counts, so pixel pitch stays constant
    /// regardless of velocity ripple.
    fn start_encoder_gated_scan(
        &mut self,
        start_mm: f64,
        pixel_count: usize,
        encoder_divisor: f64,
    ) -> StageResult<()>;

    /// True while any motor is running.
    fn is_busy(&mut self) -> StageResult<bool>;

    /// Poll until all motors are idle.
    ///
    /// Only for use before or after a scan, never inside the per-row grab
    /// loop where it would blow the per-frame timeout budget.
    fn wait_until_idle(&mut self) -> StageResult<()> {
        while self.is_busy()? {
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    /// Stop all active motors immediately.
    fn halt(&mut self) -> StageResult<()>;

    /// Release the serial handle.
    fn close(&mut self) -> StageResult<()>;
}

use super::{Axis, Stage, StageResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A stage command as recorded by [`MockStage`].
#[derive(Debug, Clone, PartialEq)]
pub enum StageCommand {
    MoveTo { axis: Axis, position_mm: f64 },
    SetVelocity { axis: Axis, mm_per_s: f64 },
    StartEncoderGatedScan {
        start_mm: f64,
        pixel_count: usize,
        encoder_divisor: f64,
    },
    Halt,
}

/// Recording stage for orchestrator tests.
///
/// Every command is appended to a shared log; `is_busy` answers `true` for
/// a configurable number of polls before going idle, which exercises the
/// wait-until-idle path without real motion.
pub struct MockStage {
    commands: Arc<Mutex<Vec<StageCommand>>>,
    busy_polls: usize,
    close_count: Arc<AtomicUsize>,
}

impl MockStage {
    pub fn new() -> Self {
        Self::with_busy_polls(0)
    }

    /// A stage that reports busy for the first `busy_polls` calls to
    /// `is_busy` after construction.
    pub fn with_busy_polls(busy_polls: usize) -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            busy_polls,
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle to the command log.
    pub fn command_log(&self) -> Arc<Mutex<Vec<StageCommand>>> {
        Arc::clone(&self.commands)
    }

    /// Shared handle to the close-call counter.
    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }

    fn record(&self, command: StageCommand) {
        self.commands.lock().unwrap().push(command);
    }
}

impl Default for MockStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for MockStage {
    fn move_to(&mut self, axis: Axis, position_mm: f64) -> StageResult<()> {
        self.record(StageCommand::MoveTo { axis, position_mm });
        Ok(())
    }

    fn set_velocity(&mut self, axis: Axis, mm_per_s: f64) -> StageResult<()> {
        self.record(StageCommand::SetVelocity { axis, mm_per_s });
        Ok(())
    }

    fn start_encoder_gated_scan(
        &mut self,
        start_mm: f64,
        pixel_count: usize,
        encoder_divisor: f64,
    ) -> StageResult<()> {
        self.record(StageCommand::StartEncoderGatedScan {
            start_mm,
            pixel_count,
            encoder_divisor,
        });
        Ok(())
    }

    fn is_busy(&mut self) -> StageResult<bool> {
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn halt(&mut self) -> StageResult<()> {
        self.record(StageCommand::Halt);
        Ok(())
    }

    fn close(&mut self) -> StageResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

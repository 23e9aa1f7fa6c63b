use shared::camera_interface::CameraError;
use shared::stage_interface::StageError;
use shared::zone::ZoneLayoutError;
use thiserror::Error;

/// Error type for a scan session.
///
/// Device and configuration errors are fatal: the session aborts without
/// saving a partial volume, though cleanup still closes both handles.
/// Degraded frames and missing calibration never appear here; they are
/// counted and warned respectively.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("stage error: {0}")]
    Stage(#[from] StageError),

    #[error("camera error: {0}")]
    Camera(#[from] CameraError),

    /// Consecutive grab timeouts exceeded the retry budget.
    #[error("grab timed out {attempts} times in a row, aborting session")]
    GrabRetriesExhausted { attempts: usize },

    #[error("invalid zone layout: {0}")]
    ZoneLayout(#[from] ZoneLayoutError),

    #[error("configuration error: {0}")]
    Config(String),

    /// A zone's overlap window is empty for the requested scan length.
    #[error(
        "zone {zone} offset {offset} leaves no overlap rows for a {total_rows}-row scan \
         on a {sensor_rows}-row sensor"
    )]
    EmptyOverlap {
        zone: usize,
        offset: usize,
        total_rows: usize,
        sensor_rows: usize,
    },

    #[error("frame carries {got} zones but {expected} are configured")]
    ZoneCountMismatch { expected: usize, got: usize },

    #[error("row index {row_index} is outside the {expected_rows}-row plane")]
    RowIndexOutOfRange {
        row_index: usize,
        expected_rows: usize,
    },
}

pub type ScanResult<T> = Result<T, ScanError>;

use shared::stage_interface::StageError;
use std::fmt;
use thiserror::Error;

/// Controller error codes carried by `:N-<code>` replies.
///
/// Codes -7..-20 and -30..-39 are reserved by the vendor (filterwheel and
/// future use) and are reported verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ms2000ErrorCode {
    /// -1: command not recognized.
    UnknownCommand,
    /// -2: unrecognized axis parameter.
    UnrecognizedAxis,
    /// -3: command requires one or more axis parameters.
    MissingParameters,
    /// -4: parameter out of range.
    ParameterOutOfRange,
    /// -5: operation failed.
    OperationFailed,
    /// -6: undefined error.
    UndefinedError,
    /// -21: serial command halted by the HALT command.
    HaltedByCommand,
    /// Any reserved or unknown code.
    Reserved(i32),
}

impl Ms2000ErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::UnknownCommand,
            -2 => Self::UnrecognizedAxis,
            -3 => Self::MissingParameters,
            -4 => Self::ParameterOutOfRange,
            -5 => Self::OperationFailed,
            -6 => Self::UndefinedError,
            -21 => Self::HaltedByCommand,
            other => Self::Reserved(other),
        }
    }
}

impl fmt::Display for Ms2000ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command (-1)"),
            Self::UnrecognizedAxis => write!(f, "unrecognized axis parameter (-2)"),
            Self::MissingParameters => write!(f, "missing axis parameters (-3)"),
            Self::ParameterOutOfRange => write!(f, "parameter out of range (-4)"),
            Self::OperationFailed => write!(f, "operation failed (-5)"),
            Self::UndefinedError => write!(f, "undefined error (-6)"),
            Self::HaltedByCommand => write!(f, "halted by the HALT command (-21)"),
            Self::Reserved(code) => write!(f, "reserved error code ({code})"),
        }
    }
}

/// Error type for MS-2000 driver operations.
#[derive(Error, Debug)]
pub enum Ms2000Error {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("invalid baud rate {0}; valid rates are 9600, 19200, 28800, 115200")]
    InvalidBaudRate(u32),

    #[error("controller replied {code}")]
    Command { code: Ms2000ErrorCode },

    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(String),

    #[error("serial port already closed")]
    PortClosed,
}

pub type Ms2000Result<T> = Result<T, Ms2000Error>;

impl From<Ms2000Error> for StageError {
    fn from(error: Ms2000Error) -> Self {
        match error {
            Ms2000Error::Io(e) => StageError::Io(e),
            Ms2000Error::Serial(e) => StageError::Hardware(e.to_string()),
            Ms2000Error::Command { code } => StageError::CommandFailed(code.to_string()),
            Ms2000Error::UnexpectedResponse(response) => {
                StageError::UnexpectedResponse(response)
            }
            other => StageError::Hardware(other.to_string()),
        }
    }
}

//! ASI MS-2000 stage controller driver.
//!
//! Speaks the MS-2000 high-level serial protocol: ASCII commands terminated
//! with CR, replies terminated with CR/LF. Positive replies start with `:A`,
//! errors with `:N-<code>`. Distances on the wire are in tenths of microns
//! (1 mm = 10000 units).
//!
//! The encoder-gated scan uses the controller's single-axis raster mode:
//! TTL output follows the X encoder so the camera sees one trigger pulse
//! per pixel pitch regardless of velocity ripple during the ramp.

pub mod errors;

pub use errors::{Ms2000Error, Ms2000ErrorCode, Ms2000Result};

use serialport::SerialPort;
use shared::stage_interface::{Axis, Stage, StageResult};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Distance units per millimeter on the serial protocol.
const UNITS_PER_MM: f64 = 10000.0;

/// Baud rates the controller's DIP switches can select.
const VALID_BAUD_RATES: [u32; 4] = [9600, 19200, 28800, 115200];

const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Serial connection to an MS-2000 controller.
pub struct Ms2000 {
    port: Option<Box<dyn SerialPort>>,
}

impl Ms2000 {
    /// Open the controller on `path` at `baud`.
    pub fn connect(path: &str, baud: u32) -> Ms2000Result<Self> {
        if !VALID_BAUD_RATES.contains(&baud) {
            return Err(Ms2000Error::InvalidBaudRate(baud));
        }

        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()?;
        info!("Connected to MS-2000 on {} at {} baud", path, baud);

        Ok(Self { port: Some(port) })
    }

    fn port(&mut self) -> Ms2000Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(Ms2000Error::PortClosed)
    }

    /// Send one command and return the controller's reply line, already
    /// checked for an `:N-` error code.
    fn query(&mut self, command: &str) -> Ms2000Result<String> {
        let port = self.port()?;
        port.clear(serialport::ClearBuffer::All)?;
        debug!("MS-2000 >> {}", command);

        port.write_all(command.as_bytes())?;
        port.write_all(b"\r")?;
        port.flush()?;

        let response = read_line(port.as_mut())?;
        debug!("MS-2000 << {}", response);
        check_response(&response)?;
        Ok(response)
    }

    /// Absolute position of one axis, in millimeters.
    pub fn position(&mut self, axis: Axis) -> Ms2000Result<f64> {
        let response = self.query(&format!("WHERE {axis}"))?;
        parse_position(&response)
    }

    /// Declare the current position as the origin on all axes.
    pub fn zero(&mut self) -> Ms2000Result<()> {
        self.query("Z")?;
        Ok(())
    }
}

/// Read bytes until LF, dropping CR.
fn read_line<R: Read + ?Sized>(port: &mut R) -> Ms2000Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        port.read_exact(&mut byte)?;
        match byte[0] {
            b'\n' => break,
            b'\r' => {}
            b => line.push(b),
        }
    }
    String::from_utf8(line).map_err(|e| Ms2000Error::UnexpectedResponse(e.to_string()))
}

/// Map an `:N-<code>` reply to the corresponding error; any other reply is
/// accepted (queries answer with bare values, commands with `:A`).
fn check_response(response: &str) -> Ms2000Result<()> {
    let trimmed = response.trim();
    if let Some(code_text) = trimmed.strip_prefix(":N") {
        let code = code_text
            .trim()
            .parse::<i32>()
            .map_err(|_| Ms2000Error::UnexpectedResponse(response.to_string()))?;
        return Err(Ms2000Error::Command {
            code: Ms2000ErrorCode::from_code(code),
        });
    }
    Ok(())
}

/// Parse the reply to the STATUS command: `B` while any motor runs, `N`
/// when idle.
fn parse_busy(response: &str) -> Ms2000Result<bool> {
    match response.trim() {
        s if s.contains('B') => Ok(true),
        s if s.contains('N') => Ok(false),
        _ => Err(Ms2000Error::UnexpectedResponse(response.to_string())),
    }
}

/// Parse a WHERE reply (`:A <units>`) into millimeters.
fn parse_position(response: &str) -> Ms2000Result<f64> {
    response
        .split_whitespace()
        .last()
        .and_then(|token| token.parse::<f64>().ok())
        .map(|units| units / UNITS_PER_MM)
        .ok_or_else(|| Ms2000Error::UnexpectedResponse(response.to_string()))
}

impl Stage for Ms2000 {
    fn move_to(&mut self, axis: Axis, position_mm: f64) -> StageResult<()> {
        let units = (position_mm * UNITS_PER_MM).round();
        self.query(&format!("M {axis}={units}"))?;
        Ok(())
    }

    fn set_velocity(&mut self, axis: Axis, mm_per_s: f64) -> StageResult<()> {
        self.query(&format!("S {axis}={mm_per_s:.4}"))?;
        Ok(())
    }

    fn start_encoder_gated_scan(
        &mut self,
        start_mm: f64,
        pixel_count: usize,
        encoder_divisor: f64,
    ) -> StageResult<()> {
        let start_units = (start_mm * UNITS_PER_MM).round();

        // Route the TTL output to the encoder comparator, program the
        // raster (start, pulse spacing, pulse count), select X as the fast
        // axis, then fire. The controller runs the scan autonomously.
        self.query("TTL X=1")?;
        self.query(&format!(
            "NR X={start_units} Z={encoder_divisor} F={pixel_count}"
        ))?;
        self.query("SN X=1 Y=0 Z=0 F=0")?;
        self.query("SN")?;
        info!(
            "Encoder-gated scan started: {} pulses from {:.4} mm, divisor {}",
            pixel_count, start_mm, encoder_divisor
        );
        Ok(())
    }

    fn is_busy(&mut self) -> StageResult<bool> {
        let response = self.query("/")?;
        Ok(parse_busy(&response)?)
    }

    fn halt(&mut self) -> StageResult<()> {
        // HALT answers :N-21 when it actually interrupted a command;
        // that is success here, not an error.
        match self.query("\\") {
            Ok(_) => Ok(()),
            Err(Ms2000Error::Command {
                code: Ms2000ErrorCode::HaltedByCommand,
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) -> StageResult<()> {
        if self.port.take().is_some() {
            info!("MS-2000 serial port closed");
        }
        Ok(())
    }
}

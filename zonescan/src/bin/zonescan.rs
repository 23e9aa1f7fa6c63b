//! Run one multi-zone scan session and write the reconstructed volumes.

use anyhow::{Context, Result};
use clap::Parser;
use hardware::{Ms2000, SimulatedZoneCamera};
use shared::calibration::CalibrationStore;
use shared::camera_interface::{SensorGeometry, TriggerEdge, TriggerSource};
use shared::frame_writer::FrameWriterHandle;
use shared::stage_interface::{mock::MockStage, Stage};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use zonescan::orchestrator::{ScanConfig, ScanOrchestrator};
use zonescan::pipeline::reconstruct;

/// Velocity used for the pre-scan reposition move, in mm/s.
const REPOSITION_VELOCITY_MM_PER_S: f64 = 1.0;

/// Margin added to the exposure to form the grab deadline.
const GRAB_TIMEOUT_MARGIN: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    name = "zonescan",
    about = "Acquire a multi-zone line scan and reconstruct the registered volume"
)]
struct Args {
    /// Number of sensor zones (1-8)
    #[arg(long, default_value_t = 5)]
    zones: usize,

    /// Fields of view swept past the scan midpoint
    #[arg(long, default_value_t = 2)]
    overlap_factor: usize,

    /// Scan midpoint as "x,y" in millimeters
    #[arg(long, default_value = "0.0,0.0", value_parser = parse_coordinates)]
    midpoint: (f64, f64),

    /// Scan velocity in mm/s
    #[arg(long, default_value_t = 0.22225)]
    velocity: f64,

    /// Exposure time in microseconds
    #[arg(long, default_value_t = 50.0)]
    exposure_us: f64,

    /// Serial port of the MS-2000 controller. Without it the session runs
    /// against a recording mock stage (dry run with the simulated camera).
    #[arg(long)]
    stage_port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = 115200)]
    baud: u32,

    /// Directory the volumes and parameter record are written to
    #[arg(long, default_value = "scan_output")]
    output: PathBuf,

    /// Skip column correction even when a calibration exists
    #[arg(long)]
    no_correction: bool,
}

/// Parse an "x,y" coordinate pair.
fn parse_coordinates(input: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = input.split(',').collect();
    if parts.len() != 2 {
        return Err(format!("expected \"x,y\", got {input:?}"));
    }
    let x = parts[0]
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid x coordinate: {e}"))?;
    let y = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid y coordinate: {e}"))?;
    Ok((x, y))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    let args = Args::parse();

    let geometry = SensorGeometry::aca2040();
    let camera = SimulatedZoneCamera::new(geometry);

    let stage: Box<dyn Stage> = match &args.stage_port {
        Some(port) => Box::new(
            Ms2000::connect(port, args.baud)
                .with_context(|| format!("opening MS-2000 on {port}"))?,
        ),
        None => {
            info!("No stage port given, running against a mock stage");
            Box::new(MockStage::new())
        }
    };

    let exposure = Duration::from_secs_f64(args.exposure_us * 1e-6);
    let config = ScanConfig {
        zone_count: args.zones,
        overlap_factor: args.overlap_factor,
        scan_midpoint_mm: args.midpoint,
        scan_velocity_mm_per_s: args.velocity,
        reposition_velocity_mm_per_s: REPOSITION_VELOCITY_MM_PER_S,
        exposure,
        grab_timeout: exposure + GRAB_TIMEOUT_MARGIN,
        trigger_source: TriggerSource::Line(1),
        trigger_edge: TriggerEdge::Rising,
    };
    let parameters = config.scan_parameters(&geometry);

    let orchestrator = ScanOrchestrator::new(stage, Box::new(camera), config);
    let outcome = orchestrator.run()?;
    info!(
        "Total rows requested: {}, recorded: {}, degraded: {}",
        outcome.summary.requested_rows,
        outcome.summary.recorded_rows,
        outcome.summary.degraded_frames
    );

    let correction = if args.no_correction {
        None
    } else {
        load_correction(args.zones)
    };

    let output = reconstruct(
        &outcome.volume,
        &outcome.zones,
        geometry.height_pix,
        correction.as_ref(),
    )?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    parameters
        .save_to_file(&args.output.join("scan_params.json"))
        .context("writing scan parameters")?;

    let writer = FrameWriterHandle::new(4, 64);
    writer.write_volume(&output.raw, &args.output, "raw")?;
    writer.write_volume(&output.registered.stack, &args.output, "registered")?;
    writer.wait_for_completion();

    info!("Scan artifacts written to {}", args.output.display());
    Ok(())
}

fn load_correction(zone_count: usize) -> Option<shared::calibration::ColumnCorrection> {
    let store = match CalibrationStore::new() {
        Ok(store) => store,
        Err(e) => {
            warn!("Calibration store unavailable: {}", e);
            return None;
        }
    };
    match store.get_column_correction(zone_count) {
        Some(Ok(correction)) => Some(correction),
        Some(Err(e)) => {
            warn!("Failed to read column correction: {}", e);
            None
        }
        None => {
            warn!(
                "No column correction calibrated for {} zones, proceeding without",
                zone_count
            );
            None
        }
    }
}

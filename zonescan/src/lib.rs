//! Multi-zone line-scan acquisition and reconstruction engine.
//!
//! A motorized stage sweeps the specimen under an area sensor configured
//! into narrow ROI zones; the stage encoder pulses the camera so each grab
//! carries one line-scan sample per zone. This crate turns that stream into
//! registered image planes:
//!
//! 1. [`demux`] splits the grab stream into per-zone planes.
//! 2. [`overlap`] crops each plane to its valid overlap window.
//! 3. [`correction`] divides out the per-column interference pattern.
//! 4. [`registration`] finds and applies integer row/column shifts between
//!    symmetric plane pairs.
//! 5. [`stack`] crops to a common shape and stacks the planes.
//!
//! [`orchestrator`] runs the acquisition session against the `Stage` and
//! `ZoneCamera` interfaces from the `shared` crate, and [`pipeline`] wires
//! the post-processing stages together.

pub mod correction;
pub mod demux;
pub mod error;
pub mod orchestrator;
pub mod overlap;
pub mod pipeline;
pub mod registration;
pub mod stack;

pub use error::{ScanError, ScanResult};

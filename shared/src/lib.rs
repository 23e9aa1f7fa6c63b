//! Shared components for the zone-scan instrument stack.
//!
//! This crate contains the domain types and collaborator interfaces used
//! across the acquisition, hardware, and reconstruction crates: sensor zone
//! geometry, the camera and stage abstractions (with scripted mocks for
//! testing), calibration storage, and the background frame writer.

pub mod calibration;
pub mod camera_interface;
pub mod frame_writer;
pub mod scan_params;
pub mod stage_interface;
pub mod zone;

//! Hardware adapters for the zone-scan instrument.
//!
//! Each device implements the corresponding interface from the `shared`
//! crate so the orchestrator never depends on a vendor stack directly:
//!
//! - [`ms2000`] — ASI MS-2000 stage controller over a serial line.
//! - [`sim_camera`] — synthetic zone camera for dry runs and demos.

pub mod ms2000;
pub mod sim_camera;

pub use ms2000::Ms2000;
pub use sim_camera::SimulatedZoneCamera;

//! Common-shape crop and stacking.

use crate::registration::ShiftRecord;
use ndarray::{s, Array2, Array3, Axis};

/// The registered output volume: planes of identical shape stacked along a
/// leading zone axis, plus the shifts that produced them.
#[derive(Debug, Clone)]
pub struct RegisteredVolume {
    pub stack: Array3<u16>,
    pub shifts: Vec<ShiftRecord>,
}

/// Crop every plane to the minimum row and column counts and stack them in
/// zone order.
///
/// Odd differences crop `floor(diff / 2)` from the top or left and the
/// remainder from the bottom or right. The rounding direction is fixed; the
/// reference outputs depend on it.
pub fn assemble(planes: &[Array2<f64>], shifts: Vec<ShiftRecord>) -> RegisteredVolume {
    let rows = planes.iter().map(Array2::nrows).min().unwrap_or(0);
    let cols = planes.iter().map(Array2::ncols).min().unwrap_or(0);

    let mut stack = Array3::zeros((planes.len(), rows, cols));
    for (zone, plane) in planes.iter().enumerate() {
        let top = (plane.nrows() - rows) / 2;
        let left = (plane.ncols() - cols) / 2;
        let window = plane.slice(s![top..top + rows, left..left + cols]);

        let mut target = stack.index_axis_mut(Axis(0), zone);
        target.zip_mut_with(&window, |out, &value| *out = quantize(value));
    }

    RegisteredVolume { stack, shifts }
}

fn quantize(value: f64) -> u16 {
    value.round().clamp(0.0, u16::MAX as f64) as u16
}

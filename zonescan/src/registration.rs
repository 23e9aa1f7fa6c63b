//! Integer-pixel plane registration.
//!
//! Zone-to-zone timing skew and stage micro-vibration leave a constant
//! integer pixel offset between planes. For each symmetric pair (outermost
//! planes first partner with each other) the engine runs an exhaustive
//! sum-of-squared-differences search over both trim directions, rows first
//! and then columns on the row-adjusted planes, and trims the winning shift
//! off the pair. Exhaustive search is O(w) image differences per axis but
//! immune to local minima.
//!
//! Sign convention: a positive shift removed the leading edge (top or left)
//! from the lower-indexed plane and the trailing edge from its partner;
//! negative is the reverse; zero left the pair untouched.

use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;
use tracing::debug;

/// The shift applied to one symmetric plane pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRecord {
    pub plane_a: usize,
    pub plane_b: usize,
    pub row_shift: isize,
    pub col_shift: isize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchAxis {
    Rows,
    Cols,
}

/// Register all symmetric pairs in place and report the applied shifts.
///
/// Pairs are `(i, N-1-i)` for `i < N/2`; an odd plane count leaves the
/// middle plane untouched. Planes keep their zone order.
pub fn register_planes(planes: &mut [Array2<f64>]) -> Vec<ShiftRecord> {
    let n = planes.len();
    let mut records = Vec::with_capacity(n / 2);

    for i in 0..n / 2 {
        let j = n - 1 - i;

        let row_shift = search_shift(&planes[i], &planes[j], SearchAxis::Rows);
        let (head, tail) = planes.split_at_mut(j);
        apply_shift(&mut head[i], &mut tail[0], row_shift, SearchAxis::Rows);

        let col_shift = search_shift(&head[i], &tail[0], SearchAxis::Cols);
        apply_shift(&mut head[i], &mut tail[0], col_shift, SearchAxis::Cols);

        debug!(
            "Registered pair ({}, {}): row shift {}, col shift {}",
            i, j, row_shift, col_shift
        );
        records.push(ShiftRecord {
            plane_a: i,
            plane_b: j,
            row_shift,
            col_shift,
        });
    }

    records
}

/// Find the signed shift minimizing the SSD between two planes along one
/// axis, compared over their common leading extent.
fn search_shift(a: &Array2<f64>, b: &Array2<f64>, axis: SearchAxis) -> isize {
    let rows = a.nrows().min(b.nrows());
    let cols = a.ncols().min(b.ncols());
    let av = a.slice(s![..rows, ..cols]);
    let bv = b.slice(s![..rows, ..cols]);

    let extent = match axis {
        SearchAxis::Rows => rows,
        SearchAxis::Cols => cols,
    };
    // Degenerates to the baseline-only search when the extent is under 10.
    let w = (extent / 10).max(1);

    let baseline = ssd(&av, &bv);
    let mut first = vec![baseline];
    let mut second = vec![baseline];
    let sweep: Vec<(f64, f64)> = (1..w)
        .into_par_iter()
        .map(|shift| match axis {
            // "down": trailing rows off `a`, leading rows off `b`.
            SearchAxis::Rows => (
                ssd(&av.slice(s![..rows - shift, ..]), &bv.slice(s![shift.., ..])),
                ssd(&av.slice(s![shift.., ..]), &bv.slice(s![..rows - shift, ..])),
            ),
            // "right": leading columns off `a`, trailing columns off `b`.
            SearchAxis::Cols => (
                ssd(&av.slice(s![.., shift..]), &bv.slice(s![.., ..cols - shift])),
                ssd(&av.slice(s![.., ..cols - shift]), &bv.slice(s![.., shift..])),
            ),
        })
        .collect();
    for (first_err, second_err) in sweep {
        first.push(first_err);
        second.push(second_err);
    }

    let (first_idx, first_min) = argmin(&first);
    let (second_idx, second_min) = argmin(&second);

    // Exact ties go to the first-computed direction ("down" / "right").
    if first_min <= second_min {
        match axis {
            SearchAxis::Rows => -(first_idx as isize),
            SearchAxis::Cols => first_idx as isize,
        }
    } else {
        match axis {
            SearchAxis::Rows => second_idx as isize,
            SearchAxis::Cols => -(second_idx as isize),
        }
    }
}

/// Trim the full planes by the signed shift. Each plane loses rows or
/// columns from exactly one edge.
fn apply_shift(a: &mut Array2<f64>, b: &mut Array2<f64>, shift: isize, axis: SearchAxis) {
    let s = shift.unsigned_abs();
    if s == 0 {
        return;
    }

    let leading_off_a = shift > 0;
    match (axis, leading_off_a) {
        (SearchAxis::Rows, true) => {
            *a = a.slice(s![s.., ..]).to_owned();
            *b = b.slice(s![..b.nrows() - s, ..]).to_owned();
        }
        (SearchAxis::Rows, false) => {
            *a = a.slice(s![..a.nrows() - s, ..]).to_owned();
            *b = b.slice(s![s.., ..]).to_owned();
        }
        (SearchAxis::Cols, true) => {
            *a = a.slice(s![.., s..]).to_owned();
            *b = b.slice(s![.., ..b.ncols() - s]).to_owned();
        }
        (SearchAxis::Cols, false) => {
            *a = a.slice(s![.., ..a.ncols() - s]).to_owned();
            *b = b.slice(s![.., s..]).to_owned();
        }
    }
}

fn ssd(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Index of the first occurrence of the minimum.
fn argmin(errors: &[f64]) -> (usize, f64) {
    let mut best = 0;
    for (index, &value) in errors.iter().enumerate() {
        if value < errors[best] {
            best = index;
        }
    }
    (best, errors[best])
}

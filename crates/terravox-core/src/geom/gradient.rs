//! Finite-difference gradient shared by the slope/aspect fields.
//! `pub(crate)` only; callers go through `compute_geom_fields`.

use crate::grid::Grid;

/// Per-axis gradient of `y` in blocks per cell.
///
/// Interior cells use central differences `(f[i+1] − f[i−1]) / 2`; border
/// cells use the one-sided difference toward the interior. An axis of length
/// 1 has zero gradient.
///
/// Returns `(d/dx, d/dz)`, i.e. the row-axis and column-axis derivatives.
pub(crate) fn central_gradient(y: &Grid<f32>) -> (Grid<f32>, Grid<f32>) {
    let rows = y.height;
    let cols = y.width;
    let mut d_row = Grid::new(cols, rows, 0.0f32);
    let mut d_col = Grid::new(cols, rows, 0.0f32);

    for r in 0..rows {
        for c in 0..cols {
            d_row.set(r, c, axis_diff(rows, r, |k| y.get(k, c)));
            d_col.set(r, c, axis_diff(cols, c, |k| y.get(r, k)));
        }
    }
    (d_row, d_col)
}

#[inline]
fn axis_diff<F: Fn(usize) -> f32>(n: usize, i: usize, at: F) -> f32 {
    if n < 2 {
        0.0
    } else if i == 0 {
        at(1) - at(0)
    } else if i == n - 1 {
        at(n - 1) - at(n - 2)
    } else {
        (at(i + 1) - at(i - 1)) * 0.5
    }
}

//! Slope, aspect and gradient fields derived from fitted elevation.
mod gradient;
pub mod smooth;

use crate::grid::{Grid, HeightGrid};
use gradient::central_gradient;
use smooth::gaussian_filter;

/// Terrain derivatives consumed by material classification.
#[derive(Debug, Clone)]
pub struct GeomFields {
    /// Gradient magnitude in blocks per cell.
    pub slope: Grid<f32>,
    /// `slope` after Gaussian smoothing; the cliff detector reads this one.
    pub slope_smooth: Grid<f32>,
    /// `atan2(−d/dx, d/dz)` in radians.
    pub aspect: Grid<f32>,
    /// Row-axis derivative.
    pub grad_x: Grid<f32>,
    /// Column-axis derivative.
    pub grad_z: Grid<f32>,
}

/// Compute slope/aspect fields from the final integer elevation.
pub fn compute_geom_fields(y: &HeightGrid, slope_sigma: f64) -> GeomFields {
    let yf = y.to_f32();
    let (grad_x, grad_z) = central_gradient(&yf);

    let mut slope = Grid::new(y.width, y.height, 0.0f32);
    let mut aspect = Grid::new(y.width, y.height, 0.0f32);
    for i in 0..y.len() {
        let gx = grad_x.data[i];
        let gz = grad_z.data[i];
        slope.data[i] = (gx * gx + gz * gz).sqrt();
        aspect.data[i] = (-gx).atan2(gz);
    }
    let slope_smooth = gaussian_filter(&slope, slope_sigma.max(0.0));

    GeomFields { slope, slope_smooth, aspect, grad_x, grad_z }
}

//! Single-octave coherent noise sampled on the cell lattice.
use noise::{NoiseFn, OpenSimplex};

use crate::grid::Grid;

const MIN_WAVELENGTH: f64 = 1e-6;

/// One OpenSimplex field with a fixed wavelength (cells per noise unit).
pub struct CoherentField {
    pub wavelength: f64,
    noise: OpenSimplex,
}

impl CoherentField {
    pub fn new(seed: u32, wavelength: f64) -> Self {
        Self { wavelength: wavelength.max(MIN_WAVELENGTH), noise: OpenSimplex::new(seed) }
    }

    /// Value at cell `(row, col)`, clipped to `[-1, 1]`.
    #[inline]
    pub fn sample(&self, row: usize, col: usize) -> f32 {
        let x = row as f64 / self.wavelength;
        let z = col as f64 / self.wavelength;
        self.noise.get([x, z]).clamp(-1.0, 1.0) as f32
    }

    /// Evaluate the field over a `width × height` lattice, scaled by `amplitude`.
    pub fn render(&self, width: usize, height: usize, amplitude: f64) -> Grid<f32> {
        let amp = amplitude as f32;
        let mut out = Grid::new(width, height, 0.0f32);
        for r in 0..height {
            for c in 0..width {
                out.set(r, c, self.sample(r, c) * amp);
            }
        }
        out
    }
}

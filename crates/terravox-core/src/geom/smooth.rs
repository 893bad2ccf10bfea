//! Separable Gaussian smoothing with half-sample-symmetric (reflect)
//! boundaries and a kernel truncated at 4σ.

use crate::grid::Grid;

const TRUNCATE: f64 = 4.0;

/// Smooth `src` with a Gaussian of standard deviation `sigma` cells.
/// `sigma <= 0` returns an unchanged copy.
pub fn gaussian_filter(src: &Grid<f32>, sigma: f64) -> Grid<f32> {
    if sigma <= 0.0 || src.is_empty() {
        return src.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let rows = src.height;
    let cols = src.width;

    // Pass 1: along columns (within each row).
    let mut tmp = Grid::new(cols, rows, 0.0f32);
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0f64;
            for (k, &w) in kernel.iter().enumerate() {
                let cc = reflect(c as isize + k as isize - radius, cols);
                acc += w * src.get(r, cc) as f64;
            }
            tmp.set(r, c, acc as f32);
        }
    }

    // Pass 2: along rows.
    let mut out = Grid::new(cols, rows, 0.0f32);
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0f64;
            for (k, &w) in kernel.iter().enumerate() {
                let rr = reflect(r as isize + k as isize - radius, rows);
                acc += w * tmp.get(rr, c) as f64;
            }
            out.set(r, c, acc as f32);
        }
    }
    out
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let two_s2 = 2.0 * sigma * sigma;
    let mut k: Vec<f64> = (-radius..=radius).map(|x| (-(x * x) as f64 / two_s2).exp()).collect();
    let sum: f64 = k.iter().sum();
    for w in &mut k {
        *w /= sum;
    }
    k
}

/// Map an out-of-range index back into `[0, n)` by mirroring about the
/// outer cell edges: `… b a | a b c … | c b …`.
#[inline]
fn reflect(mut i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        } else {
            return i as usize;
        }
    }
}

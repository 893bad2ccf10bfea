//! Hysteresis cliff detection on smoothed slope.
use crate::grid::{Grid, MaskGrid};
use crate::morphology::dilate_once;

/// Cells with slope strictly above `high`, grown through 4-connected cells
/// with slope strictly above `low`. Thresholds are narrowed to `f32` so a
/// slope stored as exactly the threshold value never passes.
pub fn hysteresis_mask(slope: &Grid<f32>, high: f64, low: f64) -> MaskGrid {
    let (high, low) = (high as f32, low as f32);
    let strong = slope.map(|&s| s > high);
    let weak = slope.map(|&s| s > low);
    grow_within(&strong, &weak)
}

/// Repeat `dilate(seed) ∧ limit` until the mask stops changing.
///
/// Each pass either adds a cell or terminates, so the loop runs at most
/// `cells + 1` times.
pub fn grow_within(seed: &MaskGrid, limit: &MaskGrid) -> MaskGrid {
    let mut current = seed.clone();
    for _ in 0..=seed.len() {
        let mut grown = dilate_once(&current);
        for (g, &l) in grown.data.iter_mut().zip(limit.data.iter()) {
            *g &= l;
        }
        if grown == current {
            break;
        }
        current = grown;
    }
    current
}

//! River mask derivation and channel carving.
use crate::config::TOTAL_HEIGHT;
use crate::error::Result;
use crate::grid::{Grid, HeightGrid, MaskGrid};
use crate::stats::percentile;

/// Cells whose accumulation reaches the `threshold_percentile` of the
/// accumulation distribution, OR'd with an optional external river mask.
pub fn derive_river_mask(
    accumulation: &[f64],
    width: usize,
    height: usize,
    threshold_percentile: f64,
    external: Option<&MaskGrid>,
) -> Result<MaskGrid> {
    let threshold = percentile(accumulation.iter().copied(), threshold_percentile);
    let inferred = accumulation.iter().map(|&a| a >= threshold).collect();
    let mut mask = Grid::from_vec(width, height, inferred)?;
    if let Some(ext) = external {
        mask.ensure_same_shape(ext, "river mask")?;
        for (m, &e) in mask.data.iter_mut().zip(ext.data.iter()) {
            *m |= e;
        }
    }
    Ok(mask)
}

/// Lower river cells by `depth`, clip to the legal range and round.
pub fn carve_rivers(surface: &Grid<f32>, rivers: &MaskGrid, depth: i32) -> HeightGrid {
    let top = (TOTAL_HEIGHT - 1) as f32;
    let mut out = Grid::new(surface.width, surface.height, 0i16);
    for (i, o) in out.data.iter_mut().enumerate() {
        let mut v = surface.data[i];
        if rivers.data[i] {
            v -= depth as f32;
        }
        *o = v.clamp(0.0, top).round_ties_even() as i16;
    }
    out
}

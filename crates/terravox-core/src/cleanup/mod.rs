//! Label smoothing and speckle removal.
mod components;
mod majority;

use log::debug;

use crate::error::{PipelineError, Result};
use crate::grid::{Grid, LabelGrid};
use crate::stats::mean;
use crate::tiling::TileSpec;
pub use components::remove_small_components;
pub use majority::majority_filter;

/// Majority filter followed by small-component removal.
/// Returns the cleaned labels and the speckle rate.
pub fn cleanup_labels(labels: &LabelGrid, majority_radius: usize, min_area: usize) -> (LabelGrid, f64) {
    let smoothed = majority_filter(labels, majority_radius);
    remove_small_components(&smoothed, min_area)
}

/// Run `cleanup_labels` on each tile's halo window and keep only its core.
///
/// The speckle rate is the mean over tiles. Every cell must be written by
/// exactly one core; a gap is reported as `IncompleteCleanup`.
pub fn cleanup_labels_tiled(
    labels: &LabelGrid,
    tiles: &[TileSpec],
    majority_radius: usize,
    min_area: usize,
) -> Result<(LabelGrid, f64)> {
    let mut assembled: Grid<Option<u16>> = Grid::new(labels.width, labels.height, None);
    let mut rates = Vec::with_capacity(tiles.len());

    for t in tiles {
        let (cleaned, rate) = cleanup_labels(&t.halo_of(labels), majority_radius, min_area);
        let (ox, oz) = t.core_offset();
        let (h, w) = t.core_shape();
        for r in 0..h {
            for c in 0..w {
                assembled.set(t.x0 + r, t.z0 + c, Some(cleaned.get(ox + r, oz + c)));
            }
        }
        debug!("cleanup {}: speckle rate {rate:.5}", t.name());
        rates.push(rate);
    }

    let unassigned = assembled.data.iter().filter(|l| l.is_none()).count();
    if unassigned > 0 {
        return Err(PipelineError::IncompleteCleanup(unassigned));
    }
    let data = assembled.data.into_iter().flatten().collect();
    let out = Grid::from_vec(labels.width, labels.height, data)?;
    Ok((out, mean(rates)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::build_tiles;

    fn speckled(rows: usize, cols: usize) -> LabelGrid {
        let mut g = Grid::new(cols, rows, 0u16);
        for r in (3..rows).step_by(9) {
            for c in (5..cols).step_by(11) {
                g.set(r, c, 3);
            }
        }
        for r in 0..rows {
            for c in cols / 2..cols {
                if g.get(r, c) == 0 {
                    g.set(r, c, 1);
                }
            }
        }
        g
    }

    #[test]
    fn single_tile_matches_whole_grid_cleanup() {
        let g = speckled(40, 50);
        let tiles = build_tiles(g.shape(), 512, 16);
        let (whole, rate) = cleanup_labels(&g, 1, 8);
        let (tiled, tiled_rate) = cleanup_labels_tiled(&g, &tiles, 1, 8).unwrap();
        assert_eq!(whole, tiled);
        assert!((rate - tiled_rate).abs() < 1e-12);
    }

    #[test]
    fn tiled_cleanup_removes_speckle_everywhere() {
        let g = speckled(70, 90);
        let tiles = build_tiles(g.shape(), 32, 4);
        let (out, rate) = cleanup_labels_tiled(&g, &tiles, 0, 4).unwrap();
        assert!(out.data.iter().all(|&l| l != 3), "isolated 3s must be gone");
        assert!(rate > 0.0);
    }

    #[test]
    fn missing_core_is_fatal() {
        let g = speckled(40, 40);
        let mut tiles = build_tiles(g.shape(), 32, 4);
        tiles.pop();
        assert!(matches!(
            cleanup_labels_tiled(&g, &tiles, 1, 4),
            Err(PipelineError::IncompleteCleanup(_))
        ));
    }
}

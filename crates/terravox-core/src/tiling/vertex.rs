//! Cell-corner vertex elevations.
use crate::error::{PipelineError, Result};
use crate::grid::{Grid, HeightGrid, VertexGrid};

use super::TileSpec;

/// Vertex `(i, j)` is the mean of the cells `(i-1..=i) × (j-1..=j)` that
/// exist, yielding a `(rows + 1) × (cols + 1)` grid.
pub fn height_to_vertex_grid(cells: &HeightGrid) -> VertexGrid {
    let rows = cells.height;
    let cols = cells.width;
    let mut v = Grid::new(cols + 1, rows + 1, 0.0f32);
    for i in 0..=rows {
        for j in 0..=cols {
            let mut sum = 0.0f32;
            let mut n = 0u8;
            for ci in [i.wrapping_sub(1), i] {
                for cj in [j.wrapping_sub(1), j] {
                    if ci < rows && cj < cols {
                        sum += f32::from(cells.get(ci, cj));
                        n += 1;
                    }
                }
            }
            if n > 0 {
                v.set(i, j, sum / f32::from(n));
            }
        }
    }
    v
}

/// The core's vertices, computed on the tile's halo window and sliced out.
///
/// Cores sit at least `overlap` cells inside their halo unless the halo is
/// clipped by the grid edge, so every core vertex sees exactly the cells it
/// would see on the full grid.
pub fn core_vertex_grid(y: &HeightGrid, t: &TileSpec) -> Result<VertexGrid> {
    let halo_v = height_to_vertex_grid(&t.halo_of(y));
    let (ox, oz) = t.core_offset();
    let (h, w) = t.core_shape();
    let expected = (h + 1, w + 1);
    let (vr, vc) = halo_v.shape();
    if ox + h + 1 > vr || oz + w + 1 > vc {
        return Err(PipelineError::VertexGridShape {
            i: t.i,
            j: t.j,
            expected,
            actual: (vr.saturating_sub(ox).min(h + 1), vc.saturating_sub(oz).min(w + 1)),
        });
    }
    let core = halo_v.window(ox, ox + h + 1, oz, oz + w + 1);
    if core.shape() != expected {
        return Err(PipelineError::VertexGridShape { i: t.i, j: t.j, expected, actual: core.shape() });
    }
    Ok(core)
}

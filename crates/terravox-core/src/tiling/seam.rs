//! Cross-tile seam validation.
use std::collections::BTreeMap;

use log::warn;

use super::{neighbor_pairs, SeamSide, TileSpec};
use crate::error::{PipelineError, Result};
use crate::grid::{Grid, VertexGrid};

#[derive(Debug, Clone)]
pub struct SeamReport {
    /// Per-cell maximum mismatch of any seam touching the cell.
    pub seam_map: Grid<f32>,
    /// `⌈max |Δ|⌉` over every shared boundary vertex.
    pub max_diff: u32,
}

/// Compare the shared boundary vertices of every adjacent tile pair.
///
/// South pairs compare a's last vertex row with b's first, east pairs a's
/// last column with b's first. Mismatches are painted onto the cells on
/// either side of the seam. Pairs with a missing vertex grid are skipped.
pub fn seam_diff_report(
    shape: (usize, usize),
    tiles: &[TileSpec],
    vertex_grids: &BTreeMap<(usize, usize), &VertexGrid>,
) -> SeamReport {
    let (rows, cols) = shape;
    let mut seam_map = Grid::new(cols, rows, 0.0f32);
    let mut max_diff = 0.0f32;

    for (a, b, side) in neighbor_pairs(tiles) {
        let (Some(va), Some(vb)) = (vertex_grids.get(&(a.i, a.j)), vertex_grids.get(&(b.i, b.j))) else {
            warn!("seam {}/{}: vertex grid missing, pair skipped", a.name(), b.name());
            continue;
        };
        if va.is_empty() || vb.is_empty() {
            continue;
        }
        let diffs: Vec<f32> = match side {
            SeamSide::East => {
                let n = va.height.min(vb.height);
                (0..n).map(|r| (va.get(r, va.width - 1) - vb.get(r, 0)).abs()).collect()
            }
            SeamSide::South => {
                let n = va.width.min(vb.width);
                (0..n).map(|c| (va.get(va.height - 1, c) - vb.get(0, c)).abs()).collect()
            }
        };
        let local_max = diffs.iter().copied().fold(0.0f32, f32::max);
        max_diff = max_diff.max(local_max);

        match side {
            SeamSide::East => {
                let (x0, x1) = (a.x0.max(b.x0), a.x1.min(b.x1));
                let z_left = a.z1.saturating_sub(1);
                let z_right = b.z0.min(cols.saturating_sub(1));
                for (x, &d) in (x0..x1).zip(diffs.iter()) {
                    paint(&mut seam_map, x, z_left, d);
                    paint(&mut seam_map, x, z_right, d);
                }
            }
            SeamSide::South => {
                let (z0, z1) = (a.z0.max(b.z0), a.z1.min(b.z1));
                let x_top = a.x1.saturating_sub(1);
                let x_bottom = b.x0.min(rows.saturating_sub(1));
                for (z, &d) in (z0..z1).zip(diffs.iter()) {
                    paint(&mut seam_map, x_top, z, d);
                    paint(&mut seam_map, x_bottom, z, d);
                }
            }
        }
    }

    SeamReport { seam_map, max_diff: max_diff.ceil() as u32 }
}

fn paint(map: &mut Grid<f32>, r: usize, c: usize, d: f32) {
    if r < map.height && c < map.width && d > map.get(r, c) {
        map.set(r, c, d);
    }
}

/// Fail when the seam diagnostic exceeds the allowed mismatch.
pub fn assert_seam_threshold(max_diff: u32, allowed: u32) -> Result<()> {
    if max_diff > allowed {
        return Err(PipelineError::SeamMismatch { max_diff, allowed });
    }
    Ok(())
}

//! Overlapping tile decomposition, per-tile export and seam validation.
//!
//! Tile cores partition the grid exactly; halos extend each core by the
//! overlap margin, clipped to the grid, and are read-only context.
pub mod scheduler;
pub mod seam;
pub mod vertex;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::grid::Grid;

pub use scheduler::{
    export_tiles, resolve_worker_count, ManifestRow, NullTileWriter, SchedulerParams, TileArtifacts, TileBatch,
    TileExportResult, TileWriter, WrittenFile,
};
pub use seam::{assert_seam_threshold, seam_diff_report, SeamReport};
pub use vertex::{core_vertex_grid, height_to_vertex_grid};

/// One tile: core `[x0, x1) × [z0, z1)` and halo `[ex0, ex1) × [ez0, ez1)`.
/// `x` indexes rows, `z` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSpec {
    pub i: usize,
    pub j: usize,
    pub x0: usize,
    pub x1: usize,
    pub z0: usize,
    pub z1: usize,
    pub ex0: usize,
    pub ex1: usize,
    pub ez0: usize,
    pub ez1: usize,
}

impl TileSpec {
    /// `tile_{i}_{j}`, the stem used for every per-tile artifact.
    pub fn name(&self) -> String {
        format!("tile_{}_{}", self.i, self.j)
    }

    pub fn core_shape(&self) -> (usize, usize) {
        (self.x1 - self.x0, self.z1 - self.z0)
    }

    pub fn halo_shape(&self) -> (usize, usize) {
        (self.ex1 - self.ex0, self.ez1 - self.ez0)
    }

    /// Offset of the core's top-left cell inside the halo window.
    pub fn core_offset(&self) -> (usize, usize) {
        (self.x0 - self.ex0, self.z0 - self.ez0)
    }

    pub fn core_of<T: Clone>(&self, grid: &Grid<T>) -> Grid<T> {
        grid.window(self.x0, self.x1, self.z0, self.z1)
    }

    pub fn halo_of<T: Clone>(&self, grid: &Grid<T>) -> Grid<T> {
        grid.window(self.ex0, self.ex1, self.ez0, self.ez1)
    }
}

/// Regular `⌈rows/size⌉ × ⌈cols/size⌉` tiling in row-major `(i, j)` order.
/// The last row and column of tiles may have smaller cores.
pub fn build_tiles(shape: (usize, usize), tile_size: usize, overlap: usize) -> Vec<TileSpec> {
    let (rows, cols) = shape;
    if tile_size == 0 {
        return Vec::new();
    }
    let ni = rows.div_ceil(tile_size);
    let nj = cols.div_ceil(tile_size);
    let mut tiles = Vec::with_capacity(ni * nj);
    for i in 0..ni {
        for j in 0..nj {
            let x0 = i * tile_size;
            let z0 = j * tile_size;
            let x1 = (x0 + tile_size).min(rows);
            let z1 = (z0 + tile_size).min(cols);
            tiles.push(TileSpec {
                i,
                j,
                x0,
                x1,
                z0,
                z1,
                ex0: x0.saturating_sub(overlap),
                ex1: (x1 + overlap).min(rows),
                ez0: z0.saturating_sub(overlap),
                ez1: (z1 + overlap).min(cols),
            });
        }
    }
    tiles
}

/// Which boundary two neighbouring tiles share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeamSide {
    /// `b` is `(i + 1, j)`: a's last vertex row against b's first.
    South,
    /// `b` is `(i, j + 1)`: a's last vertex column against b's first.
    East,
}

/// Every adjacent pair once: for each tile in order, its south then its
/// east neighbour when present.
pub fn neighbor_pairs(tiles: &[TileSpec]) -> Vec<(TileSpec, TileSpec, SeamSide)> {
    let find = |i: usize, j: usize| tiles.iter().find(|t| t.i == i && t.j == j).copied();
    let mut pairs = Vec::new();
    for t in tiles {
        if let Some(s) = find(t.i + 1, t.j) {
            pairs.push((*t, s, SeamSide::South));
        }
        if let Some(e) = find(t.i, t.j + 1) {
            pairs.push((*t, e, SeamSide::East));
        }
    }
    pairs
}

/// Count core ownership per cell; any missing or doubly owned cell aborts.
pub fn check_tile_coverage(shape: (usize, usize), tiles: &[TileSpec]) -> Result<()> {
    let (rows, cols) = shape;
    let mut coverage = vec![0u16; rows * cols];
    for t in tiles {
        for x in t.x0..t.x1.min(rows) {
            for z in t.z0..t.z1.min(cols) {
                coverage[x * cols + z] = coverage[x * cols + z].saturating_add(1);
            }
        }
    }
    let missing = coverage.iter().filter(|&&c| c == 0).count();
    let overlaps = coverage.iter().filter(|&&c| c > 1).count();
    if missing > 0 || overlaps > 0 {
        return Err(PipelineError::TileCoverage { missing, overlaps });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uneven_grid_gets_smaller_trailing_tiles() {
        let tiles = build_tiles((1030, 700), 512, 16);
        assert_eq!(tiles.len(), 3 * 2);
        let last = tiles[tiles.len() - 1];
        assert_eq!((last.i, last.j), (2, 1));
        assert_eq!(last.core_shape(), (1030 - 1024, 700 - 512));
        assert_eq!(last.ex1, 1030, "halo clipped to the grid");
        assert_eq!(last.ex0, 1024 - 16);
        let first = tiles[0];
        assert_eq!((first.ex0, first.ez0), (0, 0));
        assert_eq!((first.ex1, first.ez1), (512 + 16, 512 + 16));
        assert_eq!(first.core_offset(), (0, 0));
        assert_eq!((tiles[3].i, tiles[3].j), (1, 1));
        assert_eq!(tiles[3].core_offset(), (16, 16));
        assert_eq!(tiles[4].core_offset(), (16, 0), "first-column tiles have no west halo");
    }

    #[test]
    fn coverage_check_accepts_a_partition() {
        let tiles = build_tiles((1030, 1030), 512, 16);
        check_tile_coverage((1030, 1030), &tiles).unwrap();
    }

    #[test]
    fn coverage_check_rejects_gaps_and_overlaps() {
        let mut tiles = build_tiles((600, 600), 512, 16);
        tiles.pop();
        match check_tile_coverage((600, 600), &tiles) {
            Err(PipelineError::TileCoverage { missing, overlaps }) => {
                assert_eq!(missing, 88 * 88);
                assert_eq!(overlaps, 0);
            }
            other => panic!("expected coverage error, got {other:?}"),
        }

        let mut tiles = build_tiles((600, 600), 512, 16);
        tiles[1].z0 -= 10;
        assert!(matches!(
            check_tile_coverage((600, 600), &tiles),
            Err(PipelineError::TileCoverage { missing: 0, overlaps: 5120 })
        ));
    }

    #[test]
    fn neighbour_pairs_cover_each_shared_edge_once() {
        let tiles = build_tiles((1030, 1030), 512, 16);
        let pairs = neighbor_pairs(&tiles);
        // 3×3 tiles: 2×3 south edges + 3×2 east edges.
        assert_eq!(pairs.len(), 12);
        assert_eq!(pairs[0].2, SeamSide::South);
        assert_eq!((pairs[0].1.i, pairs[0].1.j), (1, 0));
        assert_eq!(pairs[1].2, SeamSide::East);
    }
}

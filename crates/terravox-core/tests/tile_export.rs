use std::collections::BTreeMap;
use std::sync::Mutex;

use terravox_core::tiling::{
    build_tiles, check_tile_coverage, export_tiles, seam_diff_report, SchedulerParams, TileBatch,
};
use terravox_core::{Grid, HeightGrid, LabelGrid, Result, TileArtifacts, TileWriter, VertexGrid, WrittenFile};

const N: usize = 1030;

fn layers() -> Vec<String> {
    ["grass", "rock"].iter().map(|s| s.to_string()).collect()
}

fn modular_ramp() -> HeightGrid {
    let mut y = Grid::new(N, N, 0i16);
    for x in 0..N {
        for z in 0..N {
            y.set(x, z, ((x * N + z) % 320) as i16);
        }
    }
    y
}

/// Records which tiles were written, from any worker thread.
#[derive(Default)]
struct RecordingWriter {
    seen: Mutex<Vec<String>>,
}

impl TileWriter for RecordingWriter {
    fn write_tile(&self, tile: &TileArtifacts<'_>) -> Result<Vec<WrittenFile>> {
        assert_eq!(tile.heights.shape(), tile.spec.core_shape());
        assert_eq!(tile.vertices.shape(), (tile.heights.height + 1, tile.heights.width + 1));
        self.seen.lock().unwrap().push(tile.spec.name());
        Ok(vec![WrittenFile { role: "meta".into(), path: format!("{}.meta.json", tile.spec.name()).into(), bytes: 10 }])
    }
}

fn export(y: &HeightGrid, labels: &LabelGrid, async_export: bool, workers: usize) -> TileBatch {
    let tiles = build_tiles(y.shape(), 512, 16);
    let params = SchedulerParams { async_export, tile_workers: workers, ..SchedulerParams::default() };
    export_tiles(y, labels, &tiles, &layers(), &params, &RecordingWriter::default()).unwrap()
}

#[test]
fn cores_partition_a_ragged_grid() {
    let tiles = build_tiles((N, N), 512, 16);
    assert_eq!(tiles.len(), 9, "1030 cells need three tiles per axis");
    check_tile_coverage((N, N), &tiles).unwrap();
    let last = tiles[8];
    assert_eq!((last.x0, last.x1, last.z0, last.z1), (1024, 1030, 1024, 1030));
    assert_eq!((last.ex0, last.ex1), (1008, 1030), "halo is clipped at the grid edge");
}

#[test]
fn sequential_and_parallel_exports_agree() {
    let y = modular_ramp();
    let labels = Grid::new(N, N, 0u16);
    let seq = export(&y, &labels, false, 1);
    let par = export(&y, &labels, true, 4);

    assert!(!seq.parallel);
    assert!(par.parallel);
    assert_eq!(par.workers, 4);
    assert_eq!(seq.manifest(), par.manifest(), "manifests must not depend on scheduling");
    let order: Vec<_> = par.manifest().iter().map(|m| (m.tile_i, m.tile_j)).collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted, "results come back in (i, j) order");
    for (a, b) in seq.results.iter().zip(&par.results) {
        assert_eq!(a.vertices, b.vertices, "vertex grid of {} differs", a.spec.name());
    }
    assert_eq!(seq.manifest()[0].files["meta"], "tile_0_0.meta.json");
}

#[test]
fn shared_boundaries_match_exactly() {
    let y = modular_ramp();
    let labels = Grid::new(N, N, 0u16);
    let batch = export(&y, &labels, true, 4);
    let tiles: Vec<_> = batch.results.iter().map(|r| r.spec).collect();
    let report = seam_diff_report(y.shape(), &tiles, &batch.vertex_grids());
    assert_eq!(report.max_diff, 0);
}

#[test]
fn perturbed_boundary_is_reported() {
    let y = modular_ramp();
    let labels = Grid::new(N, N, 0u16);
    let batch = export(&y, &labels, false, 1);
    let tiles: Vec<_> = batch.results.iter().map(|r| r.spec).collect();

    // Shift the west boundary column of tile (0, 1) up by three blocks.
    let mut shifted: VertexGrid = batch.results[1].vertices.clone();
    assert_eq!((batch.results[1].spec.i, batch.results[1].spec.j), (0, 1));
    for r in 0..shifted.height {
        shifted.set(r, 0, shifted.get(r, 0) + 3.0);
    }
    let mut grids: BTreeMap<(usize, usize), &VertexGrid> = batch.vertex_grids();
    grids.insert((0, 1), &shifted);

    let report = seam_diff_report(y.shape(), &tiles, &grids);
    assert!(report.max_diff > 0 && report.max_diff <= 3, "max_diff = {}", report.max_diff);
    assert!(report.seam_map.get(100, 511) > 0.0, "mismatch painted west of the seam");
    assert!(report.seam_map.get(100, 512) > 0.0, "mismatch painted east of the seam");
    assert_eq!(report.seam_map.get(100, 100), 0.0);
}

#[test]
fn every_tile_reaches_the_writer_once() {
    let y = modular_ramp();
    let labels = Grid::new(N, N, 1u16);
    let tiles = build_tiles(y.shape(), 512, 16);
    let writer = RecordingWriter::default();
    let params = SchedulerParams { async_export: true, tile_workers: 3, ..SchedulerParams::default() };
    export_tiles(&y, &labels, &tiles, &layers(), &params, &writer).unwrap();
    let mut seen = writer.seen.into_inner().unwrap();
    seen.sort();
    let mut expected: Vec<_> = tiles.iter().map(|t| t.name()).collect();
    expected.sort();
    assert_eq!(seen, expected);
}

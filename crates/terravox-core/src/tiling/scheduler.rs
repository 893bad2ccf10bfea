//! Per-tile export on a bounded worker pool.
//!
//! Workers only read the finalized height and label grids and return owned
//! results; ordering is fixed after the join by sorting on `(i, j)`, so the
//! batch is identical whatever order tasks complete in.
use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, info, warn};
#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::vertex::core_vertex_grid;
use super::{check_tile_coverage, TileSpec};
use crate::config::PipelineConfig;
use crate::error::Result;
#[cfg(feature = "threading")]
use crate::error::PipelineError;
use crate::grid::{HeightGrid, LabelGrid, VertexGrid};

const MIB: f64 = 1024.0 * 1024.0;

/// Everything a writer gets for one tile. Grids cover the core only.
pub struct TileArtifacts<'a> {
    pub spec: &'a TileSpec,
    pub heights: &'a HeightGrid,
    pub labels: &'a LabelGrid,
    pub vertices: &'a VertexGrid,
    pub layers: &'a [String],
}

/// A file produced by a `TileWriter`, reported back for the manifest and
/// the per-tile output-size limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFile {
    pub role: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Seam to external artifact writers. Called concurrently from workers.
pub trait TileWriter: Send + Sync {
    fn write_tile(&self, tile: &TileArtifacts<'_>) -> Result<Vec<WrittenFile>>;
}

/// Writes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTileWriter;

impl TileWriter for NullTileWriter {
    fn write_tile(&self, _tile: &TileArtifacts<'_>) -> Result<Vec<WrittenFile>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    pub tile_i: usize,
    pub tile_j: usize,
    pub x0: usize,
    pub z0: usize,
    pub x1: usize,
    pub z1: usize,
    pub height_min: i16,
    pub height_max: i16,
    /// Role → path of every file the writer produced.
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct TileExportResult {
    pub spec: TileSpec,
    pub manifest: ManifestRow,
    pub vertices: VertexGrid,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerParams {
    pub async_export: bool,
    /// 0 = auto.
    pub tile_workers: usize,
    pub max_vertices_per_tile: usize,
    pub max_output_bytes_per_tile: u64,
    pub warn_max_tiles: usize,
}

impl From<&PipelineConfig> for SchedulerParams {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            async_export: cfg.runtime.async_tile_export,
            tile_workers: cfg.runtime.tile_workers.max(0) as usize,
            max_vertices_per_tile: cfg.safety.max_vertices_per_tile,
            max_output_bytes_per_tile: cfg.safety.max_output_bytes_per_tile,
            warn_max_tiles: cfg.safety.warn_max_tiles,
        }
    }
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Results of one export run, sorted by `(i, j)`.
#[derive(Debug, Clone)]
pub struct TileBatch {
    pub results: Vec<TileExportResult>,
    pub workers: usize,
    pub parallel: bool,
    /// Batch-level warnings followed by per-tile warnings in tile order.
    pub warnings: Vec<String>,
}

impl TileBatch {
    pub fn manifest(&self) -> Vec<ManifestRow> {
        self.results.iter().map(|r| r.manifest.clone()).collect()
    }

    pub fn vertex_grids(&self) -> BTreeMap<(usize, usize), &VertexGrid> {
        self.results.iter().map(|r| ((r.spec.i, r.spec.j), &r.vertices)).collect()
    }
}

/// Pool size: `requested` capped by the tile count, or the available
/// parallelism when `requested` is 0. Never below 1.
pub fn resolve_worker_count(requested: usize, n_tiles: usize) -> usize {
    let cap = if requested == 0 {
        std::thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        requested
    };
    cap.min(n_tiles).max(1)
}

/// Vertex count of the closed base mesh a vertex grid would produce:
/// one top and one bottom vertex per grid point.
pub fn base_mesh_vertex_count(vertices: &VertexGrid) -> usize {
    2 * vertices.len()
}

/// Export every tile and collect the results in `(i, j)` order.
///
/// Tile coverage is checked before any work starts. The first failing tile
/// aborts the batch; files already written by other tiles are left in place.
pub fn export_tiles(
    y: &HeightGrid,
    labels: &LabelGrid,
    tiles: &[TileSpec],
    layers: &[String],
    params: &SchedulerParams,
    writer: &dyn TileWriter,
) -> Result<TileBatch> {
    y.ensure_same_shape(labels, "label grid")?;
    let mut warnings = Vec::new();
    if tiles.len() > params.warn_max_tiles {
        let msg = format!("Tile count {} exceeds safety warning threshold {}", tiles.len(), params.warn_max_tiles);
        warn!("{msg}");
        warnings.push(msg);
    }
    check_tile_coverage(y.shape(), tiles)?;

    let parallel = params.async_export && tiles.len() > 1;
    let workers = if parallel { resolve_worker_count(params.tile_workers, tiles.len()) } else { 1 };
    let export = |t: &TileSpec| export_single_tile(y, labels, t, layers, params, writer);

    let mut results = if parallel {
        run_parallel(tiles, workers, &export)?
    } else {
        tiles.iter().map(export).collect::<Result<Vec<_>>>()?
    };
    results.sort_by_key(|r| (r.spec.i, r.spec.j));
    info!(
        "exported {} tiles ({}, {} worker(s))",
        results.len(),
        if parallel { "parallel" } else { "sequential" },
        workers
    );

    for r in &results {
        warnings.extend(r.warnings.iter().cloned());
    }
    Ok(TileBatch { results, workers, parallel, warnings })
}

#[cfg(feature = "threading")]
fn run_parallel<F>(tiles: &[TileSpec], workers: usize, export: &F) -> Result<Vec<TileExportResult>>
where
    F: Fn(&TileSpec) -> Result<TileExportResult> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("tile-export-{i}"))
        .build()
        .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
    pool.install(|| tiles.par_iter().map(export).collect())
}

#[cfg(not(feature = "threading"))]
fn run_parallel<F>(tiles: &[TileSpec], _workers: usize, export: &F) -> Result<Vec<TileExportResult>>
where
    F: Fn(&TileSpec) -> Result<TileExportResult> + Sync,
{
    warn!("parallel tile export requested but built without the `threading` feature; running sequentially");
    tiles.iter().map(export).collect()
}

fn export_single_tile(
    y: &HeightGrid,
    labels: &LabelGrid,
    t: &TileSpec,
    layers: &[String],
    params: &SchedulerParams,
    writer: &dyn TileWriter,
) -> Result<TileExportResult> {
    let name = t.name();
    let core_y = t.core_of(y);
    let core_labels = t.core_of(labels);
    let vertices = core_vertex_grid(y, t)?;

    let artifacts = TileArtifacts { spec: t, heights: &core_y, labels: &core_labels, vertices: &vertices, layers };
    let files = writer.write_tile(&artifacts)?;

    let mut warnings = Vec::new();
    let mesh_vertices = base_mesh_vertex_count(&vertices);
    if mesh_vertices > params.max_vertices_per_tile {
        warnings.push(format!("{name} vertices={mesh_vertices} exceeds {}", params.max_vertices_per_tile));
    }
    let total_bytes: u64 = files.iter().map(|f| f.bytes).sum();
    if total_bytes > params.max_output_bytes_per_tile {
        warnings.push(format!(
            "{name} output size={:.2}MB exceeds {:.2}MB",
            total_bytes as f64 / MIB,
            params.max_output_bytes_per_tile as f64 / MIB
        ));
    }
    for w in &warnings {
        warn!("{w}");
    }
    debug!("{name}: core {:?}, {} file(s), {total_bytes} bytes", t.core_shape(), files.len());

    let manifest = ManifestRow {
        tile_i: t.i,
        tile_j: t.j,
        x0: t.x0,
        z0: t.z0,
        x1: t.x1,
        z1: t.z1,
        height_min: core_y.min_height(),
        height_max: core_y.max_height(),
        files: files.into_iter().map(|f| (f.role, f.path.display().to_string())).collect(),
    };
    Ok(TileExportResult { spec: *t, manifest, vertices, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::grid::Grid;
    use crate::tiling::build_tiles;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn layers() -> Vec<String> {
        vec!["grass".to_string()]
    }

    fn field(rows: usize, cols: usize) -> HeightGrid {
        let mut y = Grid::new(cols, rows, 0i16);
        for r in 0..rows {
            for c in 0..cols {
                y.set(r, c, ((r * 31 + c * 17) % 320) as i16);
            }
        }
        y
    }

    struct CountingWriter {
        calls: AtomicUsize,
        fail_on: Option<(usize, usize)>,
    }

    impl TileWriter for CountingWriter {
        fn write_tile(&self, tile: &TileArtifacts<'_>) -> Result<Vec<WrittenFile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some((tile.spec.i, tile.spec.j)) {
                return Err(PipelineError::Writer { i: tile.spec.i, j: tile.spec.j, message: "disk full".into() });
            }
            Ok(vec![WrittenFile {
                role: "grid".into(),
                path: PathBuf::from(format!("{}.grid.json", tile.spec.name())),
                bytes: (tile.heights.len() * 4) as u64,
            }])
        }
    }

    #[test]
    fn worker_count_resolution() {
        assert_eq!(resolve_worker_count(4, 9), 4);
        assert_eq!(resolve_worker_count(16, 9), 9);
        assert_eq!(resolve_worker_count(3, 0), 1);
        let auto = resolve_worker_count(0, 2);
        assert!((1..=2).contains(&auto));
    }

    #[test]
    fn results_are_sorted_and_manifest_reports_files() {
        let y = field(100, 70);
        let labels = Grid::new(70, 100, 0u16);
        let tiles = build_tiles(y.shape(), 32, 4);
        let writer = CountingWriter { calls: AtomicUsize::new(0), fail_on: None };
        let params = SchedulerParams { tile_workers: 3, ..SchedulerParams::default() };
        let batch = export_tiles(&y, &labels, &tiles, &layers(), &params, &writer).unwrap();
        assert_eq!(writer.calls.load(Ordering::SeqCst), tiles.len());
        let keys: Vec<_> = batch.results.iter().map(|r| (r.spec.i, r.spec.j)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(batch.manifest()[0].files["grid"], "tile_0_0.grid.json");
    }

    #[test]
    fn sequential_batch_reports_one_worker() {
        let y = field(64, 64);
        let labels = Grid::new(64, 64, 0u16);
        let tiles = build_tiles(y.shape(), 32, 4);
        let writer = CountingWriter { calls: AtomicUsize::new(0), fail_on: None };
        let params = SchedulerParams { async_export: false, tile_workers: 4, ..SchedulerParams::default() };
        let batch = export_tiles(&y, &labels, &tiles, &layers(), &params, &writer).unwrap();
        assert!(!batch.parallel);
        assert_eq!(batch.workers, 1, "sequential export runs on the calling thread");
    }

    #[test]
    fn soft_limits_become_warnings() {
        let y = field(64, 64);
        let labels = Grid::new(64, 64, 0u16);
        let tiles = build_tiles(y.shape(), 32, 4);
        let writer = CountingWriter { calls: AtomicUsize::new(0), fail_on: None };
        let params = SchedulerParams {
            async_export: false,
            max_vertices_per_tile: 100,
            max_output_bytes_per_tile: 10,
            warn_max_tiles: 2,
            ..SchedulerParams::default()
        };
        let batch = export_tiles(&y, &labels, &tiles, &layers(), &params, &writer).unwrap();
        assert_eq!(batch.warnings[0], "Tile count 4 exceeds safety warning threshold 2");
        // 33×33 vertex grid → 2178 base-mesh vertices.
        assert_eq!(batch.warnings[1], "tile_0_0 vertices=2178 exceeds 100");
        assert!(batch.warnings[2].starts_with("tile_0_0 output size="));
        assert_eq!(batch.warnings.len(), 1 + 2 * 4);
    }

    #[test]
    fn one_failing_tile_aborts_the_batch() {
        let y = field(64, 64);
        let labels = Grid::new(64, 64, 0u16);
        let tiles = build_tiles(y.shape(), 32, 4);
        let writer = CountingWriter { calls: AtomicUsize::new(0), fail_on: Some((1, 0)) };
        let err = export_tiles(&y, &labels, &tiles, &layers(), &SchedulerParams::default(), &writer).unwrap_err();
        assert!(matches!(err, PipelineError::Writer { i: 1, j: 0, .. }));
    }

    #[test]
    fn broken_coverage_aborts_before_dispatch() {
        let y = field(64, 64);
        let labels = Grid::new(64, 64, 0u16);
        let mut tiles = build_tiles(y.shape(), 32, 4);
        tiles.remove(0);
        let writer = CountingWriter { calls: AtomicUsize::new(0), fail_on: None };
        let err = export_tiles(&y, &labels, &tiles, &layers(), &SchedulerParams::default(), &writer).unwrap_err();
        assert!(matches!(err, PipelineError::TileCoverage { .. }));
        assert_eq!(writer.calls.load(Ordering::SeqCst), 0);
    }
}

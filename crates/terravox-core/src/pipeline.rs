//! Pipeline orchestrator: runs every stage in order and assembles the run
//! summary.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::Serialize;

use crate::cleanup::cleanup_labels_tiled;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::geom::compute_geom_fields;
use crate::grid::{ColorGrid, Grid, HeightGrid, LabelGrid, MaskGrid};
use crate::height_fit::{check_bit_depth, fit_height_to_budget, FitStats, HeightFitParams};
use crate::hydrology::{apply_hydrology, HydrologyParams};
use crate::materials::{assign_material_labels, MaterialParams, PaletteStats};
use crate::noise::{apply_multiscale_noise, NoiseParams};
use crate::qa::{assert_height_range, assert_non_negative, height_stats, material_coverage, HeightStats};
use crate::tiling::{
    assert_seam_threshold, build_tiles, export_tiles, seam_diff_report, SchedulerParams, SeamReport, TileBatch,
    TileSpec, TileWriter,
};

// ── Inputs / outputs ──────────────────────────────────────────────────────────

/// Rasters handed to the engine, already resampled to one shape.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub elevation: Grid<f32>,
    /// Bits per sample of the source the elevation was decoded from.
    pub elevation_bit_depth: u8,
    pub weights: BTreeMap<String, Grid<f32>>,
    pub masks: BTreeMap<String, MaskGrid>,
    pub colormap: Option<ColorGrid>,
}

impl PipelineInputs {
    /// Elevation only, treated as a 32-bit float source.
    pub fn from_elevation(elevation: Grid<f32>) -> Self {
        Self {
            elevation,
            elevation_bit_depth: 32,
            weights: BTreeMap::new(),
            masks: BTreeMap::new(),
            colormap: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeightInputSummary {
    pub bit_depth: u8,
    pub shape: (usize, usize),
}

#[derive(Debug, Clone, Serialize)]
pub struct QaSummary {
    pub seam_max_diff: u32,
    pub speckle_rate: f64,
    pub material_coverage: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HydrologySummary {
    pub enabled: bool,
    pub river_cells: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoiseSummary {
    pub enabled: bool,
    pub delta_min: f32,
    pub delta_max: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TilingSummary {
    pub count: usize,
    pub workers: usize,
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub map_name: String,
    pub height_input: HeightInputSummary,
    pub height_fit: FitStats,
    pub height_stats: HeightStats,
    pub qa: QaSummary,
    pub hydrology: HydrologySummary,
    pub noise: NoiseSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette_match: Option<PaletteStats>,
    pub tiles: TilingSummary,
    pub warnings: Vec<String>,
}

/// Everything external writers need after a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub heights: HeightGrid,
    pub labels: LabelGrid,
    pub river_mask: Option<MaskGrid>,
    pub tiles: Vec<TileSpec>,
    pub batch: TileBatch,
    pub seam: SeamReport,
    pub summary: RunSummary,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Run the full pipeline.
///
/// Stage order:
///   1. Height fit (after the bit-depth gate)
///   2. Hydrology
///   3. Noise
///   4. Geometry fields
///   5. Material classification
///   6. Tiled label cleanup
///   7. Tile export
///   8. Seam validation and final range checks
///
/// `allow_8bit_override` widens `cfg.input.allow_8bit_height`; it never
/// narrows it.
pub fn run_pipeline(
    cfg: &PipelineConfig,
    inputs: &PipelineInputs,
    writer: &dyn TileWriter,
    allow_8bit_override: bool,
) -> Result<PipelineOutput> {
    cfg.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    // ── 1. Height fit ───────────────────────────────────────────────────────
    let allow_8bit = cfg.input.allow_8bit_height || allow_8bit_override;
    check_bit_depth(inputs.elevation_bit_depth, allow_8bit)?;
    if inputs.elevation_bit_depth <= 8 {
        let msg = format!("{}-bit heightmap accepted by override; terracing likely", inputs.elevation_bit_depth);
        warnings.push(msg);
    }

    let (mut y, fit) = fit_height_to_budget(&inputs.elevation, &HeightFitParams::from(&cfg.height))?;
    assert_non_negative(&y, "fit")?;
    info!(
        "height fit: clip [{:.3}, {:.3}] -> y [{}, {}] ({}x{})",
        fit.h_min_percentile, fit.h_max_percentile, fit.y_min, fit.y_max, y.height, y.width
    );

    for (name, mask) in &inputs.masks {
        if mask.count() == 0 {
            let msg = format!("mask '{name}' is empty");
            warn!("{msg}");
            warnings.push(msg);
        }
    }

    // ── 2. Hydrology ────────────────────────────────────────────────────────
    let mut river_mask = inputs.masks.get(&cfg.hydrology.river_mask_name).cloned();
    if cfg.hydrology.enabled {
        let (carved, hydro) =
            apply_hydrology(&y, &HydrologyParams::from(&cfg.hydrology), river_mask.as_ref())?;
        y = carved;
        info!("hydrology: {} river cells", hydro.river_mask.count());
        river_mask = Some(hydro.river_mask);
    }
    let river_cells = river_mask.as_ref().map_or(0, |m| m.count());

    // ── 3. Noise ────────────────────────────────────────────────────────────
    let (mut delta_min, mut delta_max) = (0.0f32, 0.0f32);
    if cfg.noise.enabled {
        let road = inputs.masks.get(&cfg.noise.road_mask_name);
        let (noisy, delta) = apply_multiscale_noise(&y, &NoiseParams::from(&cfg.noise), river_mask.as_ref(), road)?;
        y = noisy;
        delta_min = delta.data.iter().copied().fold(f32::INFINITY, f32::min);
        delta_max = delta.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        info!("noise: delta range [{delta_min:.3}, {delta_max:.3}]");
    }
    assert_non_negative(&y, "hydrology/noise")?;

    // ── 4. Geometry ─────────────────────────────────────────────────────────
    let geom = compute_geom_fields(&y, cfg.geom.slope_sigma);

    // ── 5. Materials ────────────────────────────────────────────────────────
    let layers = &cfg.materials.layers;
    let mut palette_match = None;
    let labels = if cfg.materials.enabled {
        let params = MaterialParams::from_config(&cfg.materials, &cfg.height);
        let class = assign_material_labels(
            &y,
            &geom.slope_smooth,
            &inputs.weights,
            river_mask.as_ref(),
            inputs.colormap.as_ref(),
            &params,
        )?;
        warnings.extend(class.warnings);
        palette_match = class.palette;
        info!(
            "materials: {} cliff, {} snow, {} beach cells",
            class.masks.cliff.count(),
            class.masks.snow.count(),
            class.masks.beach.count()
        );
        class.labels
    } else {
        let default_idx = layers
            .iter()
            .position(|l| l == &cfg.materials.default_layer)
            .ok_or_else(|| PipelineError::Config("default layer missing from layers".into()))?;
        Grid::new(y.width, y.height, default_idx as u16)
    };

    // ── 6. Cleanup ──────────────────────────────────────────────────────────
    let tiles = build_tiles(y.shape(), cfg.tiling.tile_size, cfg.overlap());
    let (labels, speckle_rate) = cleanup_labels_tiled(
        &labels,
        &tiles,
        cfg.materials.majority_radius,
        cfg.materials.island_min_area,
    )?;
    info!("cleanup: speckle rate {speckle_rate:.5}");

    // ── 7. Tile export ──────────────────────────────────────────────────────
    let batch = export_tiles(&y, &labels, &tiles, layers, &SchedulerParams::from(cfg), writer)?;
    warnings.extend(batch.warnings.iter().cloned());

    // ── 8. Validation ───────────────────────────────────────────────────────
    let seam = seam_diff_report(y.shape(), &tiles, &batch.vertex_grids());
    info!("seam max diff: {}", seam.max_diff);
    let (lo, hi) = cfg.qa.assert_height_range;
    assert_height_range(&y, lo, hi)?;
    assert_seam_threshold(seam.max_diff, cfg.qa.assert_max_seam_diff)?;

    let summary = RunSummary {
        map_name: cfg.project.map_name.clone(),
        height_input: HeightInputSummary { bit_depth: inputs.elevation_bit_depth, shape: y.shape() },
        height_fit: fit,
        height_stats: height_stats(&y),
        qa: QaSummary {
            seam_max_diff: seam.max_diff,
            speckle_rate,
            material_coverage: material_coverage(&labels, layers),
        },
        hydrology: HydrologySummary { enabled: cfg.hydrology.enabled, river_cells },
        noise: NoiseSummary { enabled: cfg.noise.enabled, delta_min, delta_max },
        palette_match,
        tiles: TilingSummary { count: tiles.len(), workers: batch.workers, parallel: batch.parallel },
        warnings,
    };

    Ok(PipelineOutput { heights: y, labels, river_mask, tiles, batch, seam, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::NullTileWriter;

    fn hills(rows: usize, cols: usize) -> Grid<f32> {
        let mut g = Grid::new(cols, rows, 0.0f32);
        for r in 0..rows {
            for c in 0..cols {
                let (x, z) = (r as f32 / 9.0, c as f32 / 13.0);
                g.set(r, c, 400.0 * (x.sin() * z.cos()) + 3.0 * r as f32);
            }
        }
        g
    }

    #[test]
    fn small_run_produces_a_complete_summary() {
        let cfg = PipelineConfig::default();
        let out = run_pipeline(&cfg, &PipelineInputs::from_elevation(hills(96, 80)), &NullTileWriter, false).unwrap();
        assert_eq!(out.heights.shape(), (96, 80));
        assert_eq!(out.tiles.len(), 1);
        assert_eq!(out.summary.qa.seam_max_diff, 0);
        assert!(out.summary.height_stats.min >= 0 && out.summary.height_stats.max <= 319);
        let cov: f64 = out.summary.qa.material_coverage.values().sum();
        assert!((cov - 1.0).abs() < 1e-9, "coverage sums to {cov}");
        assert!(out.summary.hydrology.river_cells > 0);
        assert!(out.labels.data.iter().all(|&l| (l as usize) < cfg.materials.layers.len()));
    }

    #[test]
    fn eight_bit_source_needs_an_override() {
        let cfg = PipelineConfig::default();
        let mut inputs = PipelineInputs::from_elevation(hills(32, 32));
        inputs.elevation_bit_depth = 8;
        assert!(matches!(
            run_pipeline(&cfg, &inputs, &NullTileWriter, false),
            Err(PipelineError::EightBitHeight { bits: 8 })
        ));
        let out = run_pipeline(&cfg, &inputs, &NullTileWriter, true).unwrap();
        assert!(out.summary.warnings.iter().any(|w| w.contains("8-bit")));
    }

    #[test]
    fn disabled_materials_use_the_default_layer() {
        let mut cfg = PipelineConfig::default();
        cfg.materials.enabled = false;
        cfg.hydrology.enabled = false;
        cfg.noise.enabled = false;
        let out = run_pipeline(&cfg, &PipelineInputs::from_elevation(hills(40, 40)), &NullTileWriter, false).unwrap();
        assert!(out.labels.data.iter().all(|&l| l == 0));
        assert_eq!(out.summary.noise.delta_min, 0.0);
        assert_eq!(out.summary.hydrology.river_cells, 0);
    }

    #[test]
    fn invalid_config_fails_before_any_stage() {
        let mut cfg = PipelineConfig::default();
        cfg.tiling.overlap = 0;
        let err = run_pipeline(&cfg, &PipelineInputs::from_elevation(hills(8, 8)), &NullTileWriter, false).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}

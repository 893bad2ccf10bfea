use terravox_core::pipeline::{run_pipeline, PipelineInputs};
use terravox_core::{Grid, MaskGrid, NullTileWriter, PipelineConfig, PipelineError};

const ROWS: usize = 600;
const COLS: usize = 540;

fn terrain() -> Grid<f32> {
    let mut g = Grid::new(COLS, ROWS, 0.0f32);
    for x in 0..ROWS {
        for z in 0..COLS {
            let (fx, fz) = (x as f32 / 47.0, z as f32 / 61.0);
            g.set(x, z, 900.0 + 350.0 * fx.sin() * fz.cos() + 0.8 * x as f32 - 0.3 * z as f32);
        }
    }
    g
}

fn inputs() -> PipelineInputs {
    let mut inputs = PipelineInputs::from_elevation(terrain());
    let mut grass = Grid::new(COLS, ROWS, 0.6f32);
    let mut dirt = Grid::new(COLS, ROWS, 0.2f32);
    for x in 0..ROWS {
        for z in 0..COLS {
            if (x / 40 + z / 40) % 2 == 0 {
                grass.set(x, z, 0.1);
                dirt.set(x, z, 0.9);
            }
        }
    }
    inputs.weights.insert("grass".into(), grass);
    inputs.weights.insert("dirt".into(), dirt);

    let mut road: MaskGrid = Grid::new(COLS, ROWS, false);
    for z in 0..COLS {
        road.set(300, z, true);
    }
    inputs.masks.insert("road".into(), road);
    let mut river: MaskGrid = Grid::new(COLS, ROWS, false);
    for x in 0..ROWS {
        river.set(x, 270, true);
    }
    inputs.masks.insert("river".into(), river);
    inputs
}

#[test]
fn multi_tile_run_is_seam_free_and_in_range() {
    let cfg = PipelineConfig::default();
    let out = run_pipeline(&cfg, &inputs(), &NullTileWriter, false).unwrap();

    assert_eq!(out.tiles.len(), 4);
    assert_eq!(out.summary.tiles.count, 4);
    assert_eq!(out.summary.qa.seam_max_diff, 0);
    assert!(out.heights.min_height() >= 0);
    assert!(out.heights.max_height() <= 319);

    let river = out.river_mask.as_ref().expect("hydrology produces a river mask");
    assert!((0..ROWS).all(|x| river.get(x, 270)), "external river mask is kept");
    assert_eq!(out.summary.hydrology.river_cells, river.count());

    let coverage: f64 = out.summary.qa.material_coverage.values().sum();
    assert!((coverage - 1.0).abs() < 1e-9, "coverage sums to {coverage}");
    let n_layers = cfg.materials.layers.len();
    assert!(out.labels.data.iter().all(|&l| usize::from(l) < n_layers));
    assert!(out.summary.qa.speckle_rate >= 0.0 && out.summary.qa.speckle_rate < 1.0);
    assert!(out.summary.noise.delta_min <= out.summary.noise.delta_max);
}

#[test]
fn repeated_runs_are_identical() {
    let mut cfg = PipelineConfig::default();
    let a = run_pipeline(&cfg, &inputs(), &NullTileWriter, false).unwrap();
    cfg.runtime.async_tile_export = false;
    let b = run_pipeline(&cfg, &inputs(), &NullTileWriter, false).unwrap();
    assert_eq!(a.heights, b.heights);
    assert_eq!(a.labels, b.labels);
    assert_eq!(a.batch.manifest(), b.batch.manifest());
    assert!(a.batch.parallel && !b.batch.parallel);
}

#[test]
fn noise_seed_changes_the_surface() {
    let mut cfg = PipelineConfig::default();
    cfg.hydrology.enabled = false;
    let a = run_pipeline(&cfg, &inputs(), &NullTileWriter, false).unwrap();
    cfg.noise.seed = 99;
    let b = run_pipeline(&cfg, &inputs(), &NullTileWriter, false).unwrap();
    assert_ne!(a.heights, b.heights);
}

#[test]
fn summary_serializes_with_expected_sections() {
    let cfg = PipelineConfig::default();
    let out = run_pipeline(&cfg, &inputs(), &NullTileWriter, false).unwrap();
    let json = serde_json::to_value(&out.summary).unwrap();
    for key in ["map_name", "height_fit", "height_stats", "qa", "hydrology", "noise", "tiles", "warnings"] {
        assert!(json.get(key).is_some(), "summary is missing `{key}`");
    }
    assert!(json.get("palette_match").is_none(), "palette section only appears when matching ran");
    assert_eq!(json["qa"]["seam_max_diff"], 0);
}

#[test]
fn mismatched_mask_shape_aborts() {
    let cfg = PipelineConfig::default();
    let mut bad = inputs();
    bad.masks.insert("river".into(), Grid::new(10, 10, false));
    let err = run_pipeline(&cfg, &bad, &NullTileWriter, false).unwrap_err();
    assert!(matches!(err, PipelineError::ShapeMismatch { .. }), "got {err}");
}

#[test]
fn eight_bit_elevation_is_gated() {
    let mut cfg = PipelineConfig::default();
    let mut eight = inputs();
    eight.elevation_bit_depth = 8;
    assert!(matches!(
        run_pipeline(&cfg, &eight, &NullTileWriter, false),
        Err(PipelineError::EightBitHeight { .. })
    ));
    cfg.input.allow_8bit_height = true;
    assert!(run_pipeline(&cfg, &eight, &NullTileWriter, false).is_ok());
}

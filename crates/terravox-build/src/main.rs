//! Build driver: loads a map's rasters, runs the terrain pipeline and writes
//! tile artifacts, the tile manifest, the run summary and QA previews.

mod inputs;
mod placements;
mod preview;
mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;
use terravox_core::pipeline::{run_pipeline, RunSummary};
use terravox_core::PipelineConfig;

use crate::placements::ObjectCounts;
use crate::writer::JsonTileWriter;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "terravox-build", about = "Fit, shape, classify and tile a raster map for voxel export")]
struct Args {
    /// JSON config; omitted fields keep their defaults.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Accept 8-bit elevation rasters despite terracing.
    #[arg(long)]
    allow_8bit_height: bool,

    /// Export tiles sequentially on the calling thread.
    #[arg(long)]
    sync_tiles: bool,

    /// Tile worker count; 0 = auto.
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
    tile_workers: Option<i64>,
}

/// Apply CLI overrides on top of the file config.
fn overlay(mut cfg: PipelineConfig, args: &Args) -> PipelineConfig {
    if args.sync_tiles {
        cfg.runtime.async_tile_export = false;
    }
    if let Some(n) = args.tile_workers {
        cfg.runtime.tile_workers = n;
    }
    cfg
}

/// `qa/summary.json`: the pipeline summary plus loader-side metadata.
#[derive(Serialize)]
struct BuildSummary {
    #[serde(flatten)]
    run: RunSummary,
    input_dir: String,
    output_dir: String,
    anchors_loaded: usize,
    objects: ObjectCounts,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("Write failed: {}", path.display()))
}

/// Run one map end to end; returns the output directory.
fn build(cfg: &PipelineConfig, allow_8bit_height: bool) -> Result<PathBuf> {
    let map_dir = cfg.map_input_dir();
    let loaded = inputs::load_map_inputs(&map_dir).with_context(|| format!("Loading inputs from {}", map_dir.display()))?;

    let out_dir = cfg.map_output_dir();
    let (tiles_dir, runbook_dir, qa_dir) = (out_dir.join("tiles"), out_dir.join("runbook"), out_dir.join("qa"));
    for dir in [&tiles_dir, &runbook_dir, &qa_dir] {
        fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    }

    let writer = JsonTileWriter::new(&tiles_dir);
    let output = run_pipeline(cfg, &loaded.inputs, &writer, allow_8bit_height)
        .with_context(|| format!("Pipeline failed for map '{}'", cfg.project.map_name))?;

    let mut run = output.summary;
    let mut warnings = loaded.warnings;
    warnings.append(&mut run.warnings);
    run.warnings = warnings;
    let summary = BuildSummary {
        run,
        input_dir: map_dir.display().to_string(),
        output_dir: out_dir.display().to_string(),
        anchors_loaded: loaded.anchors_loaded,
        objects: loaded.objects,
    };
    write_json(&runbook_dir.join("tile_manifest.json"), &output.batch.manifest())?;
    write_json(&qa_dir.join("summary.json"), &summary)?;
    preview::write_previews(&qa_dir, &output.heights, &output.seam.seam_map)?;

    info!(
        "'{}': {} tiles, seam max diff {}, {} warning(s) -> {}",
        summary.run.map_name,
        summary.run.tiles.count,
        summary.run.qa.seam_max_diff,
        summary.run.warnings.len(),
        out_dir.display()
    );
    Ok(out_dir)
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = PipelineConfig::from_json_file(&args.config)
        .with_context(|| format!("Cannot load config {}", args.config.display()))?;
    let cfg = overlay(cfg, &args);
    build(&cfg, args.allow_8bit_height)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma};

    fn config_for(root: &Path) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.project.map_name = "demo".into();
        cfg.paths.input_root = root.join("input");
        cfg.paths.output_root = root.join("out");
        cfg
    }

    fn write_height16(cfg: &PipelineConfig, w: u32, h: u32) {
        let dir = cfg.map_input_dir().join("height");
        fs::create_dir_all(&dir).unwrap();
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(w, h, |x, y| Luma([(2000.0 + 900.0 * ((x as f32 / 9.0).sin() + y as f32 / 40.0)) as u16]));
        img.save(dir.join("height.png")).unwrap();
    }

    #[test]
    fn end_to_end_writes_every_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_for(tmp.path());
        write_height16(&cfg, 40, 30);
        let map_dir = cfg.map_input_dir();
        fs::create_dir_all(map_dir.join("anchors")).unwrap();
        fs::write(map_dir.join("anchors/landmarks.csv"), "name,x,z\ngate,3,4\n").unwrap();
        fs::create_dir_all(map_dir.join("placements")).unwrap();
        fs::write(map_dir.join("placements/doodads.json"), r#"[{"type":"m2"},{"type":"m2"},{"type":"wmo"}]"#).unwrap();

        let out = build(&cfg, false).unwrap();
        for rel in [
            "tiles/tile_0_0.meta.json",
            "tiles/tile_0_0.grid.json",
            "runbook/tile_manifest.json",
            "qa/summary.json",
            "qa/height_preview.png",
            "qa/seam_diff_heatmap.png",
        ] {
            assert!(out.join(rel).exists(), "missing {rel}");
        }

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("qa/summary.json")).unwrap()).unwrap();
        assert_eq!(summary["map_name"], "demo");
        assert_eq!(summary["height_input"]["bit_depth"], 16);
        assert_eq!(summary["input_dir"], map_dir.display().to_string());
        assert_eq!(summary["output_dir"], out.display().to_string());
        assert_eq!(summary["anchors_loaded"], 1);
        assert_eq!(summary["objects"]["source_files"], 1);
        assert_eq!(summary["objects"]["entries"], 3);
        assert_eq!(summary["objects"]["m2"], 2);
        assert_eq!(summary["objects"]["wmo"], 1);
        let warnings = summary["warnings"].as_array().unwrap();
        assert!(warnings.iter().any(|w| w.as_str().unwrap().contains("weights")), "loader warnings kept: {warnings:?}");

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("runbook/tile_manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest.as_array().unwrap().len(), 1);
        assert!(manifest[0]["files"]["grid"].as_str().unwrap().ends_with("tile_0_0.grid.json"));
    }

    #[test]
    fn eight_bit_png_needs_the_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_for(tmp.path());
        let dir = cfg.map_input_dir().join("height");
        fs::create_dir_all(&dir).unwrap();
        GrayImage::from_fn(24, 24, |x, y| Luma([(x * 5 + y * 3) as u8])).save(dir.join("height.png")).unwrap();

        let err = build(&cfg, false).unwrap_err();
        assert!(format!("{err:#}").contains("8-bit"), "got {err:#}");
        assert!(build(&cfg, true).is_ok());
    }

    #[test]
    fn eight_bit_tiff_needs_the_flag() {
        use tiff::encoder::{colortype, TiffEncoder};

        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_for(tmp.path());
        let dir = cfg.map_input_dir().join("height");
        fs::create_dir_all(&dir).unwrap();
        let data: Vec<u8> = (0..24 * 24).map(|i| ((i % 24) * 5 + (i / 24) * 3) as u8).collect();
        let mut enc = TiffEncoder::new(fs::File::create(dir.join("height.tif")).unwrap()).unwrap();
        enc.write_image::<colortype::Gray8>(24, 24, &data).unwrap();

        let err = build(&cfg, false).unwrap_err();
        assert!(format!("{err:#}").contains("8-bit"), "got {err:#}");
        assert!(build(&cfg, true).is_ok());
    }

    #[test]
    fn cli_overrides_runtime_settings() {
        let args = Args::parse_from(["terravox-build", "--sync-tiles", "--tile-workers", "3"]);
        let cfg = overlay(PipelineConfig::default(), &args);
        assert!(!cfg.runtime.async_tile_export);
        assert_eq!(cfg.runtime.tile_workers, 3);
        assert_eq!(args.config, PathBuf::from("config.json"));
    }

    #[test]
    fn negative_worker_count_is_rejected() {
        assert!(Args::try_parse_from(["terravox-build", "--tile-workers", "-2"]).is_err());
    }
}

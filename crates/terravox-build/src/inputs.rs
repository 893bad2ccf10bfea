//! Raster decoding for one map directory.
//!
//! Layout under `input_root/map_name`:
//!   height/height.{png,tif,tiff}   elevation (required)
//!   weights/*.png                  per-layer weights (fallback: weightmaps/)
//!   masks/*.png                    named boolean masks
//!   color/colormap.png             reference colors
//!
//! Auxiliary rasters must already match the elevation shape. Anything
//! missing or mismatched is skipped with a warning.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageBuffer, Pixel};
use log::{info, warn};
use tiff::decoder::{Decoder, DecodingResult};
use terravox_core::pipeline::PipelineInputs;
use terravox_core::{ColorGrid, Grid, MaskGrid};

use crate::placements::{count_anchors, count_object_placements, ObjectCounts};

const HEIGHT_NAMES: [&str; 3] = ["height.png", "height.tif", "height.tiff"];

pub struct HeightRaster {
    pub grid: Grid<f32>,
    pub bit_depth: u8,
}

pub struct LoadedInputs {
    pub inputs: PipelineInputs,
    pub anchors_loaded: usize,
    pub objects: ObjectCounts,
    pub warnings: Vec<String>,
}

// ── Height ───────────────────────────────────────────────────────────────────

pub fn find_height_file(map_dir: &Path) -> Option<PathBuf> {
    let dir = map_dir.join("height");
    HEIGHT_NAMES.iter().map(|n| dir.join(n)).find(|p| p.exists())
}

/// Decode an elevation raster, keeping raw sample values. Multi-channel
/// sources use their first channel.
pub fn load_height(path: &Path) -> Result<HeightRaster> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "tif" | "tiff" => load_tiff_height(path),
        _ => load_png_height(path),
    }
}

fn load_png_height(path: &Path) -> Result<HeightRaster> {
    let img = image::open(path).with_context(|| format!("Cannot decode {}", path.display()))?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let (data, bits) = first_channel(&img);
    Ok(HeightRaster { grid: Grid::from_vec(w, h, data)?, bit_depth: bits })
}

/// Channel 0 of every pixel at native depth, plus the bits per sample.
fn first_channel(img: &DynamicImage) -> (Vec<f32>, u8) {
    fn take<P: Pixel>(buf: &ImageBuffer<P, Vec<P::Subpixel>>, f: impl Fn(P::Subpixel) -> f32) -> Vec<f32> {
        buf.pixels().map(|p| f(p.channels()[0])).collect()
    }
    match img {
        DynamicImage::ImageLuma8(b) => (take(b, f32::from), 8),
        DynamicImage::ImageLumaA8(b) => (take(b, f32::from), 8),
        DynamicImage::ImageRgb8(b) => (take(b, f32::from), 8),
        DynamicImage::ImageRgba8(b) => (take(b, f32::from), 8),
        DynamicImage::ImageLuma16(b) => (take(b, f32::from), 16),
        DynamicImage::ImageLumaA16(b) => (take(b, f32::from), 16),
        DynamicImage::ImageRgb16(b) => (take(b, f32::from), 16),
        DynamicImage::ImageRgba16(b) => (take(b, f32::from), 16),
        DynamicImage::ImageRgb32F(b) => (take(b, |v| v), 32),
        DynamicImage::ImageRgba32F(b) => (take(b, |v| v), 32),
        other => (other.to_luma32f().into_raw(), 32),
    }
}

/// Channel 0 scaled to `[0, 1]`: integers by their type maximum, floats
/// by the raster maximum when it exceeds 1.
fn first_channel_unit(img: &DynamicImage) -> Vec<f32> {
    let (data, bits) = first_channel(img);
    let scale = match bits {
        8 => f32::from(u8::MAX),
        16 => f32::from(u16::MAX),
        _ => data.iter().copied().fold(1.0f32, f32::max),
    };
    data.into_iter().map(|v| (v / scale).clamp(0.0, 1.0)).collect()
}

fn load_tiff_height(path: &Path) -> Result<HeightRaster> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut decoder = Decoder::new(BufReader::new(file)).with_context(|| format!("Not a TIFF: {}", path.display()))?;
    let (w, h) = decoder.dimensions()?;
    let channels = match decoder.colortype()? {
        tiff::ColorType::Gray(_) => 1,
        tiff::ColorType::GrayA(_) => 2,
        tiff::ColorType::RGB(_) => 3,
        tiff::ColorType::RGBA(_) => 4,
        other => bail!("Unsupported TIFF color type {other:?} in {}", path.display()),
    };
    let img = decoder.read_image().with_context(|| format!("read_image failed: {}", path.display()))?;

    let (samples, bits): (Vec<f32>, u8) = match img {
        DecodingResult::U8(v) => (v.into_iter().map(f32::from).collect(), 8),
        DecodingResult::U16(v) => (v.into_iter().map(f32::from).collect(), 16),
        DecodingResult::U32(v) => (v.into_iter().map(|s| s as f32).collect(), 32),
        DecodingResult::I8(v) => (v.into_iter().map(f32::from).collect(), 8),
        DecodingResult::I16(v) => (v.into_iter().map(f32::from).collect(), 16),
        DecodingResult::I32(v) => (v.into_iter().map(|s| s as f32).collect(), 32),
        DecodingResult::F32(v) => (v, 32),
        DecodingResult::F64(v) => (v.into_iter().map(|s| s as f32).collect(), 64),
        _ => bail!("Unsupported TIFF sample type in {}", path.display()),
    };
    let data: Vec<f32> = samples.into_iter().step_by(channels).collect();
    Ok(HeightRaster { grid: Grid::from_vec(w as usize, h as usize, data)?, bit_depth: bits })
}

// ── Auxiliary rasters ────────────────────────────────────────────────────────

/// `*.png` files in `dir` as `(lowercase stem, path)`, sorted by path.
fn png_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))? {
        let path = entry?.path();
        let is_png = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            out.push((stem.to_ascii_lowercase(), path.clone()));
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(out)
}

fn shape_matches(name: &str, w: u32, h: u32, shape: (usize, usize), warnings: &mut Vec<String>) -> bool {
    if (h as usize, w as usize) == shape {
        return true;
    }
    let msg = format!("{name}: shape {h}x{w} does not match elevation {}x{}; skipped", shape.0, shape.1);
    warn!("{msg}");
    warnings.push(msg);
    false
}

/// Weights normalised to `[0, 1]` per layer.
pub fn load_weight_maps(
    map_dir: &Path,
    shape: (usize, usize),
    warnings: &mut Vec<String>,
) -> Result<BTreeMap<String, Grid<f32>>> {
    let dir = ["weights", "weightmaps"].iter().map(|d| map_dir.join(d)).find(|p| p.is_dir());
    let Some(dir) = dir else {
        let msg = "no weights/ or weightmaps/ directory; every cell starts on the default layer".to_string();
        warn!("{msg}");
        warnings.push(msg);
        return Ok(BTreeMap::new());
    };
    let mut out = BTreeMap::new();
    for (layer, path) in png_entries(&dir)? {
        let img = image::open(&path).with_context(|| format!("Cannot decode {}", path.display()))?;
        if !shape_matches(&format!("weight '{layer}'"), img.width(), img.height(), shape, warnings) {
            continue;
        }
        let data = first_channel_unit(&img);
        out.insert(layer, Grid::from_vec(shape.1, shape.0, data)?);
    }
    Ok(out)
}

/// A mask cell is set where the first channel is non-zero.
pub fn load_masks(map_dir: &Path, shape: (usize, usize), warnings: &mut Vec<String>) -> Result<BTreeMap<String, MaskGrid>> {
    let dir = map_dir.join("masks");
    if !dir.is_dir() {
        let msg = "no masks/ directory; river and road masks unavailable".to_string();
        warn!("{msg}");
        warnings.push(msg);
        return Ok(BTreeMap::new());
    }
    let mut out = BTreeMap::new();
    for (name, path) in png_entries(&dir)? {
        let img = image::open(&path).with_context(|| format!("Cannot decode {}", path.display()))?;
        if !shape_matches(&format!("mask '{name}'"), img.width(), img.height(), shape, warnings) {
            continue;
        }
        let data: Vec<bool> = first_channel(&img).0.into_iter().map(|v| v > 0.0).collect();
        out.insert(name, Grid::from_vec(shape.1, shape.0, data)?);
    }
    Ok(out)
}

pub fn load_colormap(map_dir: &Path, shape: (usize, usize), warnings: &mut Vec<String>) -> Result<Option<ColorGrid>> {
    let path = map_dir.join("color").join("colormap.png");
    if !path.exists() {
        return Ok(None);
    }
    let img = image::open(&path).with_context(|| format!("Cannot decode {}", path.display()))?;
    if !shape_matches("colormap", img.width(), img.height(), shape, warnings) {
        return Ok(None);
    }
    let data: Vec<[f32; 3]> = img.to_rgb32f().pixels().map(|p| p.0.map(|c| c.clamp(0.0, 1.0))).collect();
    Ok(Some(Grid::from_vec(shape.1, shape.0, data)?))
}

/// Load every raster for one map.
pub fn load_map_inputs(map_dir: &Path) -> Result<LoadedInputs> {
    let Some(height_path) = find_height_file(map_dir) else {
        bail!("Height image not found under {}", map_dir.join("height").display());
    };
    let height = load_height(&height_path)?;
    let shape = height.grid.shape();
    info!("height: {} ({}x{}, {}-bit)", height_path.display(), shape.0, shape.1, height.bit_depth);

    let mut warnings = Vec::new();
    let weights = load_weight_maps(map_dir, shape, &mut warnings)?;
    let masks = load_masks(map_dir, shape, &mut warnings)?;
    let colormap = load_colormap(map_dir, shape, &mut warnings)?;
    let anchors_loaded = count_anchors(map_dir, &mut warnings);
    let objects = count_object_placements(map_dir, &mut warnings);
    info!("inputs: {} weight map(s), {} mask(s), colormap: {}", weights.len(), masks.len(), colormap.is_some());
    info!("metadata: {anchors_loaded} anchor(s), {} object placement(s) in {} file(s)", objects.entries, objects.source_files);

    let inputs = PipelineInputs {
        elevation: height.grid,
        elevation_bit_depth: height.bit_depth,
        weights,
        masks,
        colormap,
    };
    Ok(LoadedInputs { inputs, anchors_loaded, objects, warnings })
}

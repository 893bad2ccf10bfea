//! Rule-based material classification.
//!
//! Baseline labels come from the weight stack argmax. Overrides then apply
//! in order, later ones winning where they overlap:
//!   1. cliff (hysteresis on smoothed slope) → rock
//!   2. snow (`y ≥ snowline`, not cliff) → snow
//!   3. beach (`|y − sea level| ≤ band`, not cliff or snow) → sand
//!   4. river (not cliff or snow) → mud
//!
//! followed by the optional palette refinement against a reference colormap.
pub mod cliff;
pub mod palette;
pub mod weights;

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::config::{HeightConfig, MaterialsConfig};
use crate::error::Result;
use crate::grid::{ColorGrid, Grid, HeightGrid, LabelGrid, MaskGrid};
pub use cliff::hysteresis_mask;
pub use palette::{PaletteStats, RefineRegions};
pub use weights::WeightStack;

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParams {
    pub layers: Vec<String>,
    pub default_layer: String,
    pub sea_level_y: i32,
    pub snowline_y: i32,
    pub beach_band_dy: i32,
    pub cliff_slope_high: f64,
    pub cliff_slope_low: f64,
    pub palette_match: bool,
}

impl MaterialParams {
    pub fn from_config(materials: &MaterialsConfig, height: &HeightConfig) -> Self {
        Self {
            layers: materials.layers.clone(),
            default_layer: materials.default_layer.clone(),
            sea_level_y: height.sea_level_y,
            snowline_y: materials.snowline_y,
            beach_band_dy: materials.beach_band_dy,
            cliff_slope_high: materials.cliff_slope_high,
            cliff_slope_low: materials.cliff_slope_low,
            palette_match: materials.palette_match.enabled,
        }
    }

    fn index_of(&self, name: &str) -> Option<u16> {
        self.layers.iter().position(|l| l == name).map(|i| i as u16)
    }
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self::from_config(&MaterialsConfig::default(), &HeightConfig::default())
    }
}

/// Override target indices after falling back through absent layers:
/// rock → 0, snow → rock, sand → rock, mud → sand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideTargets {
    pub rock: u16,
    pub snow: u16,
    pub sand: u16,
    pub mud: u16,
}

impl OverrideTargets {
    pub fn resolve(params: &MaterialParams) -> Self {
        let rock = params.index_of("rock").unwrap_or(0);
        let snow = params.index_of("snow").unwrap_or(rock);
        let sand = params.index_of("sand").unwrap_or(rock);
        let mud = params.index_of("mud").unwrap_or(sand);
        Self { rock, snow, sand, mud }
    }
}

#[derive(Debug, Clone)]
pub struct MaterialMasks {
    pub cliff: MaskGrid,
    pub snow: MaskGrid,
    /// Raw elevation band, before cliff and snow are excluded.
    pub beach: MaskGrid,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub labels: LabelGrid,
    pub masks: MaterialMasks,
    /// Present only when palette refinement actually ran.
    pub palette: Option<PaletteStats>,
    pub warnings: Vec<String>,
}

/// Classify every cell into a layer index.
pub fn assign_material_labels(
    y: &HeightGrid,
    slope_smooth: &Grid<f32>,
    weight_maps: &BTreeMap<String, Grid<f32>>,
    river: Option<&MaskGrid>,
    colormap: Option<&ColorGrid>,
    params: &MaterialParams,
) -> Result<Classification> {
    y.ensure_same_shape(slope_smooth, "smoothed slope")?;
    if let Some(r) = river {
        y.ensure_same_shape(r, "river mask")?;
    }
    if let Some(c) = colormap {
        y.ensure_same_shape(c, "colormap")?;
    }

    let stack = WeightStack::build(weight_maps, &params.layers, &params.default_layer, y.width, y.height)?;
    let mut labels = stack.argmax_labels();

    let cliff = hysteresis_mask(slope_smooth, params.cliff_slope_high, params.cliff_slope_low);
    let snow = y.map(|&v| i32::from(v) >= params.snowline_y);
    let beach = y.map(|&v| (i32::from(v) - params.sea_level_y).abs() <= params.beach_band_dy);
    let t = OverrideTargets::resolve(params);

    for i in 0..labels.len() {
        let (is_cliff, is_snow) = (cliff.data[i], snow.data[i]);
        if is_cliff {
            labels.data[i] = t.rock;
            continue;
        }
        if is_snow {
            labels.data[i] = t.snow;
            continue;
        }
        if beach.data[i] {
            labels.data[i] = t.sand;
        }
        if river.is_some_and(|r| r.data[i]) {
            labels.data[i] = t.mud;
        }
    }
    debug!(
        "materials: cliff={} snow={} beach={} cells",
        cliff.count(),
        snow.count(),
        beach.count()
    );

    let mut warnings = Vec::new();
    let mut palette = None;
    if params.palette_match {
        match colormap {
            Some(cm) => {
                let regions = RefineRegions { cliff: &cliff, snow: &snow, beach: &beach };
                let (refined, stats) = palette::refine_labels_by_palette(&labels, cm, &params.layers, &regions);
                labels = refined;
                palette = Some(stats);
            }
            None => {
                let msg = "palette_match enabled but no reference colormap supplied; skipping refinement".to_string();
                warn!("{msg}");
                warnings.push(msg);
            }
        }
    }

    Ok(Classification { labels, masks: MaterialMasks { cliff, snow, beach }, palette, warnings })
}

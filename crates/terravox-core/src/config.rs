//! Typed pipeline configuration.
//!
//! Every section carries `#[serde(default)]`, so a JSON file only needs the
//! fields it wants to change; everything else keeps the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Fixed vertical block budget. Not a tunable.
pub const TOTAL_HEIGHT: i32 = 320;
/// Fixed tile core edge length in cells. Not a tunable.
pub const TILE_SIZE: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub map_name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { map_name: "example_zone".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { input_root: PathBuf::from("input"), output_root: PathBuf::from("out") }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Accept 8-bit elevation rasters (visible terracing).
    pub allow_8bit_height: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightConfig {
    pub total_height: i32,
    pub margin_bottom: i32,
    pub margin_top: i32,
    pub percentile_low: f64,
    pub percentile_high: f64,
    pub gamma: f64,
    /// Gaussian pre-smoothing sigma in cells; 0 disables it.
    pub smooth_sigma: f64,
    pub sea_level_y: i32,
    pub bottom_y: i32,
}

impl Default for HeightConfig {
    fn default() -> Self {
        Self {
            total_height: TOTAL_HEIGHT,
            margin_bottom: 12,
            margin_top: 24,
            percentile_low: 1.0,
            percentile_high: 99.0,
            gamma: 0.85,
            smooth_sigma: 0.0,
            sea_level_y: 96,
            bottom_y: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrologyConfig {
    pub enabled: bool,
    pub fill_sinks: bool,
    pub river_threshold_percentile: f64,
    pub carve_depth: i32,
    pub river_mask_name: String,
}

impl Default for HydrologyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fill_sinks: true,
            river_threshold_percentile: 99.2,
            carve_depth: 2,
            river_mask_name: "river".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub enabled: bool,
    pub macro_amplitude: f64,
    pub macro_wavelength: f64,
    pub micro_amplitude: f64,
    pub micro_wavelength: f64,
    pub seed: u32,
    pub suppress_near_water_radius: usize,
    /// Falls back to `suppress_near_water_radius` when unset.
    pub suppress_near_road_radius: Option<usize>,
    pub road_mask_name: String,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            macro_amplitude: 6.0,
            macro_wavelength: 256.0,
            micro_amplitude: 2.0,
            micro_wavelength: 32.0,
            seed: 1337,
            suppress_near_water_radius: 5,
            suppress_near_road_radius: None,
            road_mask_name: "road".into(),
        }
    }
}

impl NoiseConfig {
    pub fn road_radius(&self) -> usize {
        self.suppress_near_road_radius.unwrap_or(self.suppress_near_water_radius)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomConfig {
    pub slope_sigma: f64,
}

impl Default for GeomConfig {
    fn default() -> Self {
        Self { slope_sigma: 1.2 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteMatchConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialsConfig {
    pub enabled: bool,
    pub default_layer: String,
    pub layers: Vec<String>,
    pub snowline_y: i32,
    pub beach_band_dy: i32,
    pub cliff_slope_high: f64,
    pub cliff_slope_low: f64,
    pub majority_radius: usize,
    pub island_min_area: usize,
    pub palette_match: PaletteMatchConfig,
}

impl Default for MaterialsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_layer: "grass".into(),
            layers: ["grass", "dirt", "rock", "sand", "snow", "mud", "gravel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            snowline_y: 220,
            beach_band_dy: 6,
            cliff_slope_high: 2.2,
            cliff_slope_low: 1.6,
            majority_radius: 1,
            island_min_area: 32,
            palette_match: PaletteMatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    pub tile_size: usize,
    pub overlap: i64,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self { tile_size: TILE_SIZE, overlap: 16 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub async_tile_export: bool,
    /// 0 selects `min(tile count, available parallelism)`.
    pub tile_workers: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { async_tile_export: true, tile_workers: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub assert_height_range: (i32, i32),
    pub assert_max_seam_diff: u32,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self { assert_height_range: (0, TOTAL_HEIGHT - 1), assert_max_seam_diff: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_vertices_per_tile: usize,
    pub max_output_bytes_per_tile: u64,
    pub warn_max_tiles: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_vertices_per_tile: 1_500_000,
            max_output_bytes_per_tile: 100 * 1024 * 1024,
            warn_max_tiles: 256,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub project: ProjectConfig,
    pub paths: PathsConfig,
    pub input: InputConfig,
    pub height: HeightConfig,
    pub hydrology: HydrologyConfig,
    pub noise: NoiseConfig,
    pub geom: GeomConfig,
    pub materials: MaterialsConfig,
    pub tiling: TilingConfig,
    pub runtime: RuntimeConfig,
    pub qa: QaConfig,
    pub safety: SafetyConfig,
}

impl PipelineConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject any configuration the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let h = &self.height;
        if h.total_height != TOTAL_HEIGHT {
            return Err(config_err(format!(
                "total_height must remain {TOTAL_HEIGHT} for this pipeline (got {})",
                h.total_height
            )));
        }
        if h.margin_bottom < 0 || h.margin_top < 0 {
            return Err(config_err("margins must be non-negative"));
        }
        if h.margin_bottom + h.margin_top >= h.total_height {
            return Err(config_err("invalid margins: no effective height remains"));
        }
        if !(0.0 <= h.percentile_low && h.percentile_low < h.percentile_high && h.percentile_high <= 100.0) {
            return Err(config_err(format!(
                "invalid percentiles: need 0 <= low < high <= 100 (got {} / {})",
                h.percentile_low, h.percentile_high
            )));
        }
        if !(h.gamma.is_finite() && h.gamma > 0.0) {
            return Err(config_err(format!("gamma must be positive (got {})", h.gamma)));
        }
        if h.smooth_sigma < 0.0 {
            return Err(config_err("height.smooth_sigma must be >= 0"));
        }

        let hy = &self.hydrology;
        if !(0.0..=100.0).contains(&hy.river_threshold_percentile) {
            return Err(config_err("hydrology.river_threshold_percentile must be in [0, 100]"));
        }
        if hy.carve_depth < 0 {
            return Err(config_err("hydrology.carve_depth must be >= 0"));
        }

        let n = &self.noise;
        if n.macro_wavelength <= 0.0 || n.micro_wavelength <= 0.0 {
            return Err(config_err("noise wavelengths must be positive"));
        }

        if self.geom.slope_sigma < 0.0 {
            return Err(config_err("geom.slope_sigma must be >= 0"));
        }

        let m = &self.materials;
        if m.layers.is_empty() {
            return Err(config_err("materials.layers must not be empty"));
        }
        if m.layers.len() > usize::from(u16::MAX) {
            return Err(config_err("too many material layers"));
        }
        if !m.layers.iter().any(|l| l == &m.default_layer) {
            return Err(config_err(format!(
                "materials.default_layer '{}' is not in materials.layers",
                m.default_layer
            )));
        }
        if m.cliff_slope_low > m.cliff_slope_high {
            return Err(config_err("materials.cliff_slope_low must not exceed cliff_slope_high"));
        }

        if self.tiling.tile_size != TILE_SIZE {
            return Err(config_err(format!(
                "tile_size must be {TILE_SIZE} for deterministic safety constraints"
            )));
        }
        if self.tiling.overlap <= 0 {
            return Err(config_err("tiling.overlap must be > 0"));
        }
        if self.runtime.tile_workers < 0 {
            return Err(config_err("runtime.tile_workers must be >= 0"));
        }
        Ok(())
    }

    /// Halo margin as a cell count. Only meaningful after `validate`.
    pub fn overlap(&self) -> usize {
        self.tiling.overlap.max(0) as usize
    }

    pub fn map_input_dir(&self) -> PathBuf {
        self.paths.input_root.join(&self.project.map_name)
    }

    pub fn map_output_dir(&self) -> PathBuf {
        self.paths.output_root.join(&self.project.map_name)
    }
}

fn config_err(msg: impl Into<String>) -> PipelineError {
    PipelineError::Config(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_overrides_field_by_field() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "height": { "gamma": 1.0 }, "noise": { "seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.height.gamma, 1.0);
        assert_eq!(cfg.height.margin_top, 24, "untouched fields keep defaults");
        assert_eq!(cfg.noise.seed, 7);
        assert_eq!(cfg.noise.macro_amplitude, 6.0);
        assert_eq!(cfg.materials.layers.len(), 7);
    }

    #[test]
    fn inverted_percentiles_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.height.percentile_low = 90.0;
        cfg.height.percentile_high = 10.0;
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn margins_consuming_budget_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.height.margin_bottom = 200;
        cfg.height.margin_top = 120;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_overlap_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.tiling.overlap = 0;
        assert!(cfg.validate().is_err());
        cfg.tiling.overlap = -4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_worker_count_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.runtime.tile_workers = -1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fixed_budget_and_tile_size_enforced() {
        let mut cfg = PipelineConfig::default();
        cfg.height.total_height = 256;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.tiling.tile_size = 256;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn road_radius_defaults_to_water_radius() {
        let mut n = NoiseConfig::default();
        assert_eq!(n.road_radius(), 5);
        n.suppress_near_road_radius = Some(2);
        assert_eq!(n.road_radius(), 2);
    }
}

//! Fit an arbitrary-range elevation raster into the fixed 320-block budget.
//!
//! Steps:
//!   1. Optional Gaussian pre-smoothing.
//!   2. Clip to `[P(p_low), P(p_high)]`.
//!   3. Normalise to `u ∈ [0, 1]` and apply the response curve `u^γ`.
//!   4. Rescale into `[margin_bottom, total − margin_top]`, round half to
//!      even, clamp to `[0, total − 1]`.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::{HeightConfig, TOTAL_HEIGHT};
use crate::error::{PipelineError, Result};
use crate::geom::smooth::gaussian_filter;
use crate::grid::{Grid, HeightGrid};
use crate::stats::Percentiles;

const NORMALISE_EPS: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct HeightFitParams {
    pub total_height: i32,
    pub margin_bottom: i32,
    pub margin_top: i32,
    pub p_low: f64,
    pub p_high: f64,
    pub gamma: f64,
    pub smooth_sigma: f64,
}

impl Default for HeightFitParams {
    fn default() -> Self {
        Self::from(&HeightConfig::default())
    }
}

impl From<&HeightConfig> for HeightFitParams {
    fn from(c: &HeightConfig) -> Self {
        Self {
            total_height: c.total_height,
            margin_bottom: c.margin_bottom,
            margin_top: c.margin_top,
            p_low: c.percentile_low,
            p_high: c.percentile_high,
            gamma: c.gamma,
            smooth_sigma: c.smooth_sigma,
        }
    }
}

/// Diagnostics reported alongside the fitted grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStats {
    pub h_min_percentile: f64,
    pub h_max_percentile: f64,
    pub y_min: i16,
    pub y_max: i16,
    /// Usable block range between the margins.
    pub h_eff: i32,
}

/// Refuse 8-bit elevation sources unless explicitly allowed.
///
/// 256 input levels stretched over 320 blocks terrace visibly, so the
/// default policy is to abort.
pub fn check_bit_depth(bits_per_sample: u8, allow_8bit: bool) -> Result<()> {
    if bits_per_sample > 8 {
        return Ok(());
    }
    if !allow_8bit {
        return Err(PipelineError::EightBitHeight { bits: bits_per_sample });
    }
    warn!("8-bit heightmap ({bits_per_sample} bits) allowed by override; expect terracing");
    Ok(())
}

/// Map raw elevation to integer block heights.
pub fn fit_height_to_budget(height: &Grid<f32>, p: &HeightFitParams) -> Result<(HeightGrid, FitStats)> {
    validate_params(p)?;
    if height.is_empty() {
        return Err(PipelineError::EmptyRaster);
    }

    let smoothed;
    let src = if p.smooth_sigma > 0.0 {
        smoothed = gaussian_filter(height, p.smooth_sigma);
        &smoothed
    } else {
        height
    };

    let pct = Percentiles::new(src.data.iter().map(|&v| v as f64));
    if pct.is_empty() {
        return Err(PipelineError::EmptyRaster);
    }
    let h_min = pct.at(p.p_low);
    let h_max = pct.at(p.p_high);

    let h_eff = p.total_height - p.margin_bottom - p.margin_top;
    let top = (p.total_height - 1) as f64;

    let y = src.map(|&v| {
        // Non-finite samples fall to the bottom of the clip range.
        let h = if v.is_finite() { (v as f64).clamp(h_min, h_max) } else { h_min };
        let u = ((h - h_min) / (h_max - h_min + NORMALISE_EPS)).clamp(0.0, 1.0);
        let u = u.powf(p.gamma);
        let y = p.margin_bottom as f64 + (u * h_eff as f64).round_ties_even();
        y.clamp(0.0, top) as i16
    });

    let stats = FitStats {
        h_min_percentile: h_min,
        h_max_percentile: h_max,
        y_min: y.min_height(),
        y_max: y.max_height(),
        h_eff,
    };
    Ok((y, stats))
}

fn validate_params(p: &HeightFitParams) -> Result<()> {
    if p.total_height != TOTAL_HEIGHT {
        return Err(PipelineError::Config(format!(
            "this pipeline assumes a fixed {TOTAL_HEIGHT} block vertical budget"
        )));
    }
    if p.margin_bottom < 0 || p.margin_top < 0 || p.margin_bottom + p.margin_top >= p.total_height {
        return Err(PipelineError::Config("invalid margins: no effective height remains".into()));
    }
    if !(0.0 <= p.p_low && p.p_low < p.p_high && p.p_high <= 100.0) {
        return Err(PipelineError::Config("invalid percentiles".into()));
    }
    if !(p.gamma.is_finite() && p.gamma > 0.0) {
        return Err(PipelineError::Config("gamma must be positive".into()));
    }
    Ok(())
}

//! Aggregate diagnostics and final range assertions.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::grid::{HeightGrid, LabelGrid};
use crate::stats::{mean, Percentiles};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightStats {
    pub min: i32,
    pub max: i32,
    pub mean: f64,
    pub p01: f64,
    pub p99: f64,
}

pub fn height_stats(y: &HeightGrid) -> HeightStats {
    let pct = Percentiles::new(y.data.iter().map(|&v| f64::from(v)));
    HeightStats {
        min: i32::from(y.min_height()),
        max: i32::from(y.max_height()),
        mean: mean(y.data.iter().map(|&v| f64::from(v))),
        p01: pct.at(1.0),
        p99: pct.at(99.0),
    }
}

/// Fraction of cells carrying each layer, keyed by layer name.
pub fn material_coverage(labels: &LabelGrid, layers: &[String]) -> BTreeMap<String, f64> {
    let mut counts = vec![0usize; layers.len()];
    for &l in &labels.data {
        if let Some(c) = counts.get_mut(usize::from(l)) {
            *c += 1;
        }
    }
    let total = labels.len();
    layers
        .iter()
        .zip(counts)
        .map(|(name, n)| {
            let frac = if total > 0 { n as f64 / total as f64 } else { 0.0 };
            (name.clone(), frac)
        })
        .collect()
}

pub fn assert_height_range(y: &HeightGrid, lo: i32, hi: i32) -> Result<()> {
    let min = i32::from(y.min_height());
    let max = i32::from(y.max_height());
    if min < lo || max > hi {
        return Err(PipelineError::HeightOutOfRange { lo, hi, min, max });
    }
    Ok(())
}

/// Fatal check that no stage pushed elevation below zero.
pub fn assert_non_negative(y: &HeightGrid, stage: &'static str) -> Result<()> {
    let min = i32::from(y.min_height());
    if min < 0 {
        return Err(PipelineError::NegativeHeight { stage, min });
    }
    Ok(())
}

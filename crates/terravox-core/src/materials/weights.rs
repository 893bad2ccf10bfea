//! Per-cell fractional material coverage.
use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::grid::{Grid, LabelGrid};

/// Row sums at or below this count as "no information".
const EMPTY_ROW_EPS: f32 = 1e-8;

/// One weight vector per cell over `layers`, stored cell-major
/// (`data[cell * layers.len() + layer]`).
#[derive(Debug, Clone)]
pub struct WeightStack {
    pub layers: Vec<String>,
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl WeightStack {
    /// Blend named weight rasters into a normalised stack.
    ///
    /// Rasters whose name is not a layer are ignored. Values are clipped to
    /// `[0, 1]`; cells with no weight anywhere are assigned fully to
    /// `default_layer` before every row is renormalised to sum to 1.
    pub fn build(
        weights: &BTreeMap<String, Grid<f32>>,
        layers: &[String],
        default_layer: &str,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        let n_layers = layers.len();
        let default_idx = layers.iter().position(|l| l == default_layer).ok_or_else(|| {
            PipelineError::Config(format!("default layer '{default_layer}' is not in the layer list"))
        })?;
        let cells = width * height;
        let mut data = vec![0.0f32; cells * n_layers];

        if weights.is_empty() {
            for cell in 0..cells {
                data[cell * n_layers + default_idx] = 1.0;
            }
            return Ok(Self { layers: layers.to_vec(), data, width, height });
        }

        for (k, name) in layers.iter().enumerate() {
            let Some(raster) = weights.get(name) else { continue };
            if raster.shape() != (height, width) {
                return Err(PipelineError::ShapeMismatch {
                    what: format!("weight map '{name}'"),
                    expected: (height, width),
                    actual: raster.shape(),
                });
            }
            for (cell, &v) in raster.data.iter().enumerate() {
                // NaN weights carry no information.
                data[cell * n_layers + k] = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
            }
        }

        for row in data.chunks_exact_mut(n_layers) {
            let mut sum: f32 = row.iter().sum();
            if sum <= EMPTY_ROW_EPS {
                row[default_idx] = 1.0;
                sum = row.iter().sum();
            }
            for w in row.iter_mut() {
                *w /= sum;
            }
        }
        Ok(Self { layers: layers.to_vec(), data, width, height })
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Weight vector of the cell at `idx` (row-major).
    #[inline]
    pub fn row(&self, idx: usize) -> &[f32] {
        let n = self.n_layers();
        &self.data[idx * n..(idx + 1) * n]
    }

    /// Index of the heaviest layer per cell; the first maximum wins.
    pub fn argmax_labels(&self) -> LabelGrid {
        let n = self.n_layers();
        let labels = self
            .data
            .chunks_exact(n)
            .map(|row| {
                let mut best = 0usize;
                for (k, &w) in row.iter().enumerate().skip(1) {
                    if w > row[best] {
                        best = k;
                    }
                }
                best as u16
            })
            .collect();
        Grid { data: labels, width: self.width, height: self.height }
    }
}

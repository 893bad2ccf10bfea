use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A row-major 2D raster. Rows index world `x`, columns index world `z`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
}

/// Integer surface elevation in blocks, `0 ≤ y < 320` once fitted.
pub type HeightGrid = Grid<i16>;
/// Index into the ordered material layer list.
pub type LabelGrid = Grid<u16>;
pub type MaskGrid = Grid<bool>;
/// Per-vertex elevation, one row and column larger than its cell grid.
pub type VertexGrid = Grid<f32>;
/// sRGB triples normalised to `[0, 1]`.
pub type ColorGrid = Grid<[f32; 3]>;

impl<T: Clone> Grid<T> {
    /// Create a grid of `height` rows by `width` columns filled with `fill`.
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self { data: vec![fill; width * height], width, height }
    }

    /// Wrap an existing row-major buffer, checking its length.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(PipelineError::ShapeMismatch {
                what: "raster buffer".into(),
                expected: (height, width),
                actual: (data.len(), 1),
            });
        }
        Ok(Self { data, width, height })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col].clone()
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    /// Copy of the half-open rectangle `[r0, r1) × [c0, c1)`.
    pub fn window(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> Grid<T> {
        let width = c1 - c0;
        let height = r1 - r0;
        let mut data = Vec::with_capacity(width * height);
        for r in r0..r1 {
            data.extend_from_slice(&self.data[r * self.width + c0..r * self.width + c1]);
        }
        Grid { data, width, height }
    }

    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> Grid<U> {
        Grid { data: self.data.iter().map(f).collect(), width: self.width, height: self.height }
    }
}

impl<T> Grid<T> {
    /// `(rows, cols)`, matching the `(x, z)` axis order.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fail with `ShapeMismatch` unless `other` has this grid's shape.
    pub fn ensure_same_shape<U>(&self, other: &Grid<U>, what: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(PipelineError::ShapeMismatch {
                what: what.to_string(),
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        Ok(())
    }
}

impl HeightGrid {
    pub fn min_height(&self) -> i16 {
        self.data.iter().copied().min().unwrap_or(0)
    }

    pub fn max_height(&self) -> i16 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    pub fn to_f32(&self) -> Grid<f32> {
        self.map(|&v| f32::from(v))
    }
}

impl MaskGrid {
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }
}

//! Error type shared by every pipeline stage.
//!
//! Configuration errors are raised before any computation starts. Invariant
//! violations (negative heights, broken tile coverage, seam mismatch) are
//! always fatal: they indicate a logic defect, never bad luck.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(
        "8-bit heightmap detected ({bits} bits per sample); abort by policy. \
         Use --allow-8bit-height only if you explicitly accept terracing risk"
    )]
    EightBitHeight { bits: u8 },

    #[error("elevation raster is empty")]
    EmptyRaster,

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("negative heights detected after {stage} (min = {min})")]
    NegativeHeight { stage: &'static str, min: i32 },

    #[error("height out of range [{lo}, {hi}] => [{min}, {max}]")]
    HeightOutOfRange { lo: i32, hi: i32, min: i32, max: i32 },

    #[error(
        "tile cores do not partition the grid (missing = {missing}, overlaps = {overlaps}); \
         abort by safety policy"
    )]
    TileCoverage { missing: usize, overlaps: usize },

    #[error("core vertex grid shape mismatch for tile {i},{j}: {actual:?} != {expected:?}")]
    VertexGridShape {
        i: usize,
        j: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("label cleanup left {0} cells unassigned")]
    IncompleteCleanup(usize),

    #[error("seam diff {max_diff} exceeds allowed {allowed}")]
    SeamMismatch { max_diff: u32, allowed: u32 },

    #[error("worker pool: {0}")]
    WorkerPool(String),

    #[error("tile writer failed for tile {i},{j}: {message}")]
    Writer { i: usize, j: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

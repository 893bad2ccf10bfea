//! Raster terrain engine: fits elevation into a fixed block budget, shapes
//! it with hydrology and noise, classifies surface materials and exports
//! seam-consistent tiles.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod geom;
pub mod grid;
pub mod height_fit;
pub mod hydrology;
pub mod materials;
pub mod morphology;
pub mod noise;
pub mod pipeline;
pub mod qa;
pub mod stats;
pub mod tiling;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use grid::{ColorGrid, Grid, HeightGrid, LabelGrid, MaskGrid, VertexGrid};
pub use pipeline::{run_pipeline, PipelineInputs, PipelineOutput, RunSummary};
pub use tiling::{NullTileWriter, TileArtifacts, TileSpec, TileWriter, WrittenFile};

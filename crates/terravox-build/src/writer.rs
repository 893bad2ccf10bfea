//! JSON artifacts per tile: `tile_{i}_{j}.meta.json` and `tile_{i}_{j}.grid.json`.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use terravox_core::tiling::TileSpec;
use terravox_core::{PipelineError, Result, TileArtifacts, TileWriter, WrittenFile};

#[derive(Serialize)]
struct TileMeta<'a> {
    tile: &'a TileSpec,
    core_shape: (usize, usize),
    height_min: i16,
    height_max: i16,
    layers: &'a [String],
}

#[derive(Serialize)]
struct TileGrid<'a> {
    width: usize,
    height: usize,
    heights: &'a [i16],
    labels: &'a [u16],
}

pub struct JsonTileWriter {
    dir: PathBuf,
}

impl JsonTileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_json<T: Serialize>(&self, spec: &TileSpec, role: &str, value: &T) -> Result<WrittenFile> {
        let path = self.dir.join(format!("{}.{role}.json", spec.name()));
        let fail = |message: String| PipelineError::Writer { i: spec.i, j: spec.j, message };
        let body = serde_json::to_vec(value).map_err(|e| fail(e.to_string()))?;
        fs::write(&path, &body).map_err(|e| fail(format!("{}: {e}", path.display())))?;
        Ok(WrittenFile { role: role.into(), path, bytes: body.len() as u64 })
    }
}

impl TileWriter for JsonTileWriter {
    fn write_tile(&self, tile: &TileArtifacts<'_>) -> Result<Vec<WrittenFile>> {
        let meta = TileMeta {
            tile: tile.spec,
            core_shape: tile.spec.core_shape(),
            height_min: tile.heights.min_height(),
            height_max: tile.heights.max_height(),
            layers: tile.layers,
        };
        let grid = TileGrid {
            width: tile.heights.width,
            height: tile.heights.height,
            heights: &tile.heights.data,
            labels: &tile.labels.data,
        };
        Ok(vec![self.write_json(tile.spec, "meta", &meta)?, self.write_json(tile.spec, "grid", &grid)?])
    }
}

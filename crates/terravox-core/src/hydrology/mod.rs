//! Depression filling, D8 flow routing and river carving.
//!
//! None of these steps fail on their own; the pipeline checks the carved
//! surface for negative heights afterwards.
pub mod fill;
pub mod flow_routing;
pub mod rivers;

use log::debug;

use crate::config::HydrologyConfig;
use crate::error::Result;
use crate::grid::{HeightGrid, MaskGrid};

pub use fill::fill_sinks_priority_flood;
pub use flow_routing::{compute_d8_flow, d8_flow_accumulation, d8_flow_direction, FlowField, D8_OFFSETS};
pub use rivers::{carve_rivers, derive_river_mask};

#[derive(Debug, Clone, PartialEq)]
pub struct HydrologyParams {
    pub fill_sinks: bool,
    pub river_threshold_percentile: f64,
    pub carve_depth: i32,
}

impl From<&HydrologyConfig> for HydrologyParams {
    fn from(c: &HydrologyConfig) -> Self {
        Self {
            fill_sinks: c.fill_sinks,
            river_threshold_percentile: c.river_threshold_percentile,
            carve_depth: c.carve_depth,
        }
    }
}

impl Default for HydrologyParams {
    fn default() -> Self {
        Self::from(&HydrologyConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct HydrologyResult {
    /// Routing over the (optionally filled) surface before carving.
    pub flow: FlowField,
    pub river_mask: MaskGrid,
}

/// Fill, route, derive rivers and carve them into `y`.
pub fn apply_hydrology(
    y: &HeightGrid,
    params: &HydrologyParams,
    river_mask: Option<&MaskGrid>,
) -> Result<(HeightGrid, HydrologyResult)> {
    let mut surface = y.to_f32();
    if params.fill_sinks {
        surface = fill_sinks_priority_flood(&surface);
    }

    let flow = compute_d8_flow(&surface);
    let rivers = derive_river_mask(
        &flow.accumulation,
        flow.width,
        flow.height,
        params.river_threshold_percentile,
        river_mask,
    )?;
    debug!("hydrology: {} river cells of {}", rivers.count(), rivers.len());

    let carved = carve_rivers(&surface, &rivers, params.carve_depth);
    Ok((carved, HydrologyResult { flow, river_mask: rivers }))
}

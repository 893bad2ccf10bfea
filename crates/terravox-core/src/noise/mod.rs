//! Macro + micro coherent displacement, damped near water and roads.
//!
//! The output is a pure function of the elevation, the masks and the seed.
pub mod field;

use log::debug;

use crate::config::{NoiseConfig, TOTAL_HEIGHT};
use crate::error::Result;
use crate::grid::{Grid, HeightGrid, MaskGrid};
use crate::morphology::dilate;
pub use field::CoherentField;

/// Multiplier applied inside the dilated river mask.
pub const WATER_ATTENUATION: f32 = 0.25;
/// Multiplier applied inside the dilated road mask.
pub const ROAD_ATTENUATION: f32 = 0.35;

#[derive(Debug, Clone, PartialEq)]
pub struct NoiseParams {
    pub macro_amplitude: f64,
    pub macro_wavelength: f64,
    pub micro_amplitude: f64,
    pub micro_wavelength: f64,
    pub seed: u32,
    pub water_radius: usize,
    pub road_radius: usize,
}

impl From<&NoiseConfig> for NoiseParams {
    fn from(c: &NoiseConfig) -> Self {
        Self {
            macro_amplitude: c.macro_amplitude,
            macro_wavelength: c.macro_wavelength,
            micro_amplitude: c.micro_amplitude,
            micro_wavelength: c.micro_wavelength,
            seed: c.seed,
            water_radius: c.suppress_near_water_radius,
            road_radius: c.road_radius(),
        }
    }
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self::from(&NoiseConfig::default())
    }
}

/// Per-cell displacement multiplier: 1.0, times 0.25 near water, times 0.35
/// near roads. Both factors apply where the zones overlap.
pub fn attenuation_field(
    width: usize,
    height: usize,
    water: Option<&MaskGrid>,
    road: Option<&MaskGrid>,
    p: &NoiseParams,
) -> Grid<f32> {
    let mut att = Grid::new(width, height, 1.0f32);
    if let Some(w) = water {
        let wet = dilate(w, p.water_radius);
        for (a, &m) in att.data.iter_mut().zip(wet.data.iter()) {
            if m {
                *a *= WATER_ATTENUATION;
            }
        }
    }
    if let Some(r) = road {
        let near = dilate(r, p.road_radius);
        for (a, &m) in att.data.iter_mut().zip(near.data.iter()) {
            if m {
                *a *= ROAD_ATTENUATION;
            }
        }
    }
    att
}

/// Add attenuated noise to `y`. Returns the new heights and the applied
/// (post-attenuation) delta field.
pub fn apply_multiscale_noise(
    y: &HeightGrid,
    p: &NoiseParams,
    water: Option<&MaskGrid>,
    road: Option<&MaskGrid>,
) -> Result<(HeightGrid, Grid<f32>)> {
    if let Some(w) = water {
        y.ensure_same_shape(w, "water mask")?;
    }
    if let Some(r) = road {
        y.ensure_same_shape(r, "road mask")?;
    }

    let macro_field = CoherentField::new(p.seed, p.macro_wavelength).render(y.width, y.height, p.macro_amplitude);
    let micro_field = CoherentField::new(p.seed.wrapping_add(1), p.micro_wavelength)
        .render(y.width, y.height, p.micro_amplitude);
    let att = attenuation_field(y.width, y.height, water, road, p);

    let top = (TOTAL_HEIGHT - 1) as f32;
    let mut delta = Grid::new(y.width, y.height, 0.0f32);
    let mut out = Grid::new(y.width, y.height, 0i16);
    for i in 0..y.len() {
        let d = (macro_field.data[i] + micro_field.data[i]) * att.data[i];
        delta.data[i] = d;
        out.data[i] = (f32::from(y.data[i]) + d).round_ties_even().clamp(0.0, top) as i16;
    }
    debug!(
        "noise: seed={} macro={}@{} micro={}@{}",
        p.seed, p.macro_amplitude, p.macro_wavelength, p.micro_amplitude, p.micro_wavelength
    );
    Ok((out, delta))
}

//! Perceptual palette refinement.
//!
//! Reference colours and layer swatches are compared in CIELAB (D65, 2°
//! observer) with the CIEDE2000 colour difference.
use serde::{Deserialize, Serialize};

use crate::grid::{ColorGrid, LabelGrid, MaskGrid};
use crate::stats::{mean, Percentiles};

/// Representative sRGB swatch per well-known layer name.
const LAYER_SWATCHES: [(&str, [f32; 3]); 7] = [
    ("grass", [0.33, 0.57, 0.28]),
    ("dirt", [0.45, 0.31, 0.20]),
    ("rock", [0.46, 0.46, 0.46]),
    ("sand", [0.76, 0.71, 0.49]),
    ("snow", [0.92, 0.94, 0.98]),
    ("mud", [0.30, 0.24, 0.18]),
    ("gravel", [0.54, 0.52, 0.49]),
];

const UNKNOWN_SWATCH: [f32; 3] = [0.5, 0.5, 0.5];

// D65 reference white.
const WHITE_X: f64 = 0.95047;
const WHITE_Y: f64 = 1.0;
const WHITE_Z: f64 = 1.08883;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteStats {
    #[serde(rename = "deltaE_mean")]
    pub delta_e_mean: f64,
    #[serde(rename = "deltaE_p95")]
    pub delta_e_p95: f64,
    #[serde(rename = "deltaE_max")]
    pub delta_e_max: f64,
}

pub fn layer_swatch(name: &str) -> [f32; 3] {
    LAYER_SWATCHES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, rgb)| *rgb)
        .unwrap_or(UNKNOWN_SWATCH)
}

fn srgb_to_linear(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn lab_f(t: f64) -> f64 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// Convert an sRGB triple (clipped to `[0, 1]`) to CIELAB.
pub fn srgb_to_lab(rgb: [f32; 3]) -> Lab {
    let [r, g, b] = rgb.map(|c| srgb_to_linear(f64::from(c).clamp(0.0, 1.0)));
    let x = 0.412453 * r + 0.357580 * g + 0.180423 * b;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = 0.019334 * r + 0.119193 * g + 0.950227 * b;

    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y / WHITE_Y);
    let fz = lab_f(z / WHITE_Z);
    Lab { l: 116.0 * fy - 16.0, a: 500.0 * (fx - fy), b: 200.0 * (fy - fz) }
}

/// CIEDE2000 colour difference with unit weighting factors.
pub fn ciede2000(c1: Lab, c2: Lab) -> f64 {
    use std::f64::consts::PI;

    let c1_ab = c1.a.hypot(c1.b);
    let c2_ab = c2.a.hypot(c2.b);
    let c_bar = 0.5 * (c1_ab + c2_ab);
    let c_bar7 = c_bar.powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + 25f64.powi(7))).sqrt());

    let a1 = c1.a * (1.0 + g);
    let a2 = c2.a * (1.0 + g);
    let cp1 = a1.hypot(c1.b);
    let cp2 = a2.hypot(c2.b);

    let hue = |b: f64, a: f64| {
        let h = b.atan2(a);
        if h < 0.0 { h + 2.0 * PI } else { h }
    };
    let hp1 = hue(c1.b, a1);
    let hp2 = hue(c2.b, a2);

    let dl = c2.l - c1.l;
    let dc = cp2 - cp1;
    let chroma_product = cp1 * cp2;

    let mut dh = hp2 - hp1;
    if chroma_product == 0.0 {
        dh = 0.0;
    } else if dh > PI {
        dh -= 2.0 * PI;
    } else if dh < -PI {
        dh += 2.0 * PI;
    }
    let d_big_h = 2.0 * chroma_product.sqrt() * (dh / 2.0).sin();

    let l_bar = 0.5 * (c1.l + c2.l);
    let cp_bar = 0.5 * (cp1 + cp2);
    let h_bar = if chroma_product == 0.0 {
        hp1 + hp2
    } else if (hp1 - hp2).abs() <= PI {
        0.5 * (hp1 + hp2)
    } else if hp1 + hp2 < 2.0 * PI {
        0.5 * (hp1 + hp2 + 2.0 * PI)
    } else {
        0.5 * (hp1 + hp2 - 2.0 * PI)
    };

    let t = 1.0 - 0.17 * (h_bar - PI / 6.0).cos()
        + 0.24 * (2.0 * h_bar).cos()
        + 0.32 * (3.0 * h_bar + PI / 30.0).cos()
        - 0.20 * (4.0 * h_bar - 63.0f64.to_radians()).cos();

    let l50 = (l_bar - 50.0).powi(2);
    let s_l = 1.0 + 0.015 * l50 / (20.0 + l50).sqrt();
    let s_c = 1.0 + 0.045 * cp_bar;
    let s_h = 1.0 + 0.015 * cp_bar * t;

    let d_theta = 30f64.to_radians() * (-((h_bar.to_degrees() - 275.0) / 25.0).powi(2)).exp();
    let cp_bar7 = cp_bar.powi(7);
    let r_c = 2.0 * (cp_bar7 / (cp_bar7 + 25f64.powi(7))).sqrt();
    let r_t = -r_c * (2.0 * d_theta).sin();

    let tl = dl / s_l;
    let tc = dc / s_c;
    let th = d_big_h / s_h;
    (tl * tl + tc * tc + th * th + r_t * tc * th).sqrt()
}

/// Region masks that select each candidate subset.
pub struct RefineRegions<'a> {
    pub cliff: &'a MaskGrid,
    pub snow: &'a MaskGrid,
    pub beach: &'a MaskGrid,
}

/// Re-pick labels by nearest swatch in each override region.
///
/// Cliffs choose among {rock, snow}, snow among {snow, rock}, beach among
/// {sand, mud, gravel} and all remaining cells among every layer. Names not in
/// `layers` are dropped from a subset; an empty subset leaves its region alone.
pub fn refine_labels_by_palette(
    labels: &LabelGrid,
    colormap: &ColorGrid,
    layers: &[String],
    regions: &RefineRegions<'_>,
) -> (LabelGrid, PaletteStats) {
    let swatches: Vec<Lab> = layers.iter().map(|n| srgb_to_lab(layer_swatch(n))).collect();
    let cell_lab: Vec<Lab> = colormap.data.iter().map(|&rgb| srgb_to_lab(rgb)).collect();
    let mut out = labels.clone();

    let subset = |names: &[&str]| -> Vec<usize> {
        names.iter().filter_map(|n| layers.iter().position(|l| l == n)).collect()
    };
    let all: Vec<usize> = (0..layers.len()).collect();
    let cliff_set = subset(&["rock", "snow"]);
    let snow_set = subset(&["snow", "rock"]);
    let beach_set = subset(&["sand", "mud", "gravel"]);

    for i in 0..out.len() {
        let cliff = regions.cliff.data[i];
        let snow = regions.snow.data[i];
        let beach = regions.beach.data[i];
        let candidates = if cliff {
            &cliff_set
        } else if snow {
            &snow_set
        } else if beach {
            &beach_set
        } else {
            &all
        };
        if let Some(best) = nearest(cell_lab[i], candidates, &swatches) {
            out.data[i] = best as u16;
        }
    }

    let de: Vec<f64> = out
        .data
        .iter()
        .zip(cell_lab.iter())
        .map(|(&label, &lab)| ciede2000(lab, swatches[usize::from(label)]))
        .collect();
    let pct = Percentiles::new(de.iter().copied());
    let stats = PaletteStats { delta_e_mean: mean(de.iter().copied()), delta_e_p95: pct.at(95.0), delta_e_max: pct.max() };
    (out, stats)
}

/// First candidate with the smallest colour difference.
fn nearest(lab: Lab, candidates: &[usize], swatches: &[Lab]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &k in candidates {
        let d = ciede2000(lab, swatches[k]);
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((k, d)),
        }
    }
    best.map(|(k, _)| k)
}

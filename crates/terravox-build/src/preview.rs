//! QA preview images.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use terravox_core::config::TOTAL_HEIGHT;
use terravox_core::{Grid, HeightGrid};

/// Block height → grayscale, 0 black, top of budget white.
pub fn height_preview(y: &HeightGrid) -> GrayImage {
    let top = (TOTAL_HEIGHT - 1) as f32;
    GrayImage::from_fn(y.width as u32, y.height as u32, |c, r| {
        let v = f32::from(y.get(r as usize, c as usize)) / top;
        Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

/// Seam mismatch heatmap: black where seams agree, red scaled to the
/// largest mismatch otherwise.
pub fn seam_heatmap(seam_map: &Grid<f32>) -> RgbImage {
    let max = seam_map.data.iter().copied().fold(0.0f32, f32::max);
    RgbImage::from_fn(seam_map.width as u32, seam_map.height as u32, |c, r| {
        let d = seam_map.get(r as usize, c as usize);
        if d <= 0.0 || max <= 0.0 {
            return Rgb([0, 0, 0]);
        }
        let t = (d / max).clamp(0.0, 1.0);
        Rgb([(80.0 + 175.0 * t) as u8, (40.0 * (1.0 - t)) as u8, 0])
    })
}

pub fn write_previews(qa_dir: &Path, y: &HeightGrid, seam_map: &Grid<f32>) -> Result<()> {
    let height_path = qa_dir.join("height_preview.png");
    height_preview(y).save(&height_path).with_context(|| format!("Write failed: {}", height_path.display()))?;
    let seam_path = qa_dir.join("seam_diff_heatmap.png");
    seam_heatmap(seam_map).save(&seam_path).with_context(|| format!("Write failed: {}", seam_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_spans_the_block_budget() {
        let y = Grid::from_vec(3, 1, vec![0i16, 160, 319]).unwrap();
        let img = height_preview(&y);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn clean_seams_render_black() {
        let map = Grid::new(4, 4, 0.0f32);
        assert!(seam_heatmap(&map).pixels().all(|p| p.0 == [0, 0, 0]));
        let mut hot = map.clone();
        hot.set(1, 2, 2.0);
        let img = seam_heatmap(&hot);
        assert_eq!(img.get_pixel(2, 1).0[0], 255, "pixel x = column, y = row");
    }
}

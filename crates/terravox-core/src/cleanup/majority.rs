use crate::grid::LabelGrid;
use crate::stats::argmax_count;

/// Replace each label with the mode of its `(2r+1)²` window.
///
/// Out-of-grid window positions repeat the nearest edge cell. Ties go to the
/// lowest label. Radius 0 returns the input unchanged.
pub fn majority_filter(labels: &LabelGrid, radius: usize) -> LabelGrid {
    if radius == 0 || labels.is_empty() {
        return labels.clone();
    }
    let rows = labels.height;
    let cols = labels.width;
    let r = radius as isize;
    let n_labels = labels.data.iter().copied().max().map_or(0, |m| usize::from(m) + 1);
    let mut counts = vec![0u32; n_labels];
    let mut out = labels.clone();

    for row in 0..rows {
        for col in 0..cols {
            counts.iter_mut().for_each(|c| *c = 0);
            for dr in -r..=r {
                let rr = (row as isize + dr).clamp(0, rows as isize - 1) as usize;
                for dc in -r..=r {
                    let cc = (col as isize + dc).clamp(0, cols as isize - 1) as usize;
                    counts[usize::from(labels.get(rr, cc))] += 1;
                }
            }
            if let Some(mode) = argmax_count(&counts) {
                out.set(row, col, mode as u16);
            }
        }
    }
    out
}

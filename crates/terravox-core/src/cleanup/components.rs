use std::collections::{BTreeSet, VecDeque};

use crate::grid::LabelGrid;
use crate::morphology::{offset, N4};
use crate::stats::argmax_count;

/// 4-connected components of the cells where `member` holds, each listed as
/// row-major indices. Components come out in raster order of their first
/// cell.
fn components_where<F: Fn(usize) -> bool>(rows: usize, cols: usize, member: F) -> Vec<Vec<usize>> {
    let mut seen = vec![false; rows * cols];
    let mut comps = Vec::new();
    let mut queue = VecDeque::new();
    for start in 0..rows * cols {
        if seen[start] || !member(start) {
            continue;
        }
        seen[start] = true;
        queue.push_back(start);
        let mut comp = Vec::new();
        while let Some(i) = queue.pop_front() {
            comp.push(i);
            let (r, c) = (i / cols, i % cols);
            for &(dr, dc) in &N4 {
                if let Some((nr, nc)) = offset(r, c, dr, dc, rows, cols) {
                    let j = nr * cols + nc;
                    if !seen[j] && member(j) {
                        seen[j] = true;
                        queue.push_back(j);
                    }
                }
            }
        }
        comps.push(comp);
    }
    comps
}

fn histogram(values: impl Iterator<Item = u16>, len: usize) -> Vec<u32> {
    let mut counts = vec![0u32; len];
    for v in values {
        counts[usize::from(v)] += 1;
    }
    counts
}

/// Reassign 4-connected components smaller than `min_area`.
///
/// Labels are visited in ascending order, each against the grid as already
/// updated by earlier labels. A small component takes the most common label
/// on its 1-cell border (its own label excluded), or the global mode when it
/// has no foreign neighbour. Returns the cleaned grid and the fraction of
/// cells that belonged to small components.
pub fn remove_small_components(labels: &LabelGrid, min_area: usize) -> (LabelGrid, f64) {
    let rows = labels.height;
    let cols = labels.width;
    let mut out = labels.clone();
    let n_labels = labels.data.iter().copied().max().map_or(0, |m| usize::from(m) + 1);
    let distinct: BTreeSet<u16> = labels.data.iter().copied().collect();
    let mut small_cells = 0usize;
    let mut in_comp = vec![false; rows * cols];

    for lab in distinct {
        let comps = {
            let current = &out;
            components_where(rows, cols, |i| current.data[i] == lab)
        };
        for comp in comps {
            if comp.len() >= min_area {
                continue;
            }
            small_cells += comp.len();

            for &i in &comp {
                in_comp[i] = true;
            }
            let mut border = Vec::new();
            for &i in &comp {
                let (r, c) = (i / cols, i % cols);
                for &(dr, dc) in &N4 {
                    if let Some((nr, nc)) = offset(r, c, dr, dc, rows, cols) {
                        let j = nr * cols + nc;
                        if !in_comp[j] {
                            // Mark so each border cell is counted once.
                            in_comp[j] = true;
                            border.push(j);
                        }
                    }
                }
            }
            for &i in comp.iter().chain(border.iter()) {
                in_comp[i] = false;
            }

            let neighbours = histogram(border.iter().map(|&j| out.data[j]).filter(|&l| l != lab), n_labels);
            let replacement = argmax_count(&neighbours)
                .or_else(|| argmax_count(&histogram(out.data.iter().copied(), n_labels)))
                .map_or(lab, |l| l as u16);
            for &i in &comp {
                out.data[i] = replacement;
            }
        }
    }

    let total = labels.len().max(1);
    (out, small_cells as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn small_patch_removed_large_block_kept() {
        let mut g = Grid::new(32, 32, 0u16);
        for r in 10..12 {
            for c in 10..12 {
                g.set(r, c, 2);
            }
        }
        for r in 20..28 {
            for c in 4..12 {
                g.set(r, c, 1);
            }
        }
        let (out, rate) = remove_small_components(&g, 16);
        for r in 10..12 {
            for c in 10..12 {
                assert_eq!(out.get(r, c), 0, "patch cell ({r},{c}) survived");
            }
        }
        for r in 20..28 {
            for c in 4..12 {
                assert_eq!(out.get(r, c), 1, "block cell ({r},{c}) changed");
            }
        }
        let expected = 4.0 / 1024.0;
        assert!((rate - expected).abs() < 1e-12, "speckle rate {rate}");
    }

    #[test]
    fn border_mode_breaks_ties_low() {
        // Single cell of 9 with two neighbours each of labels 4 and 6.
        let g = Grid::from_vec(3, 3, vec![4u16, 4, 4, 4, 9, 6, 6, 6, 6]).unwrap();
        let (out, _) = remove_small_components(&g, 2);
        assert_eq!(out.get(1, 1), 4);
    }

    #[test]
    fn lone_label_with_no_border_keeps_global_mode() {
        let g = Grid::new(3, 3, 5u16);
        let (out, rate) = remove_small_components(&g, 100);
        assert!(out.data.iter().all(|&l| l == 5));
        assert_eq!(rate, 1.0, "the whole grid counts as one small component");
    }

    #[test]
    fn components_are_four_connected() {
        // Diagonal neighbours are separate components.
        let g = Grid::from_vec(2, 2, vec![1u16, 0, 0, 1]).unwrap();
        let comps = components_where(2, 2, |i| g.data[i] == 1);
        assert_eq!(comps, vec![vec![0], vec![3]]);
    }
}

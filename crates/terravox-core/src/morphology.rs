//! Binary morphology on `MaskGrid`s with the 4-connected cross element.
use std::collections::VecDeque;

use crate::grid::MaskGrid;

pub(crate) const N4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Neighbour of `(r, c)` at offset `(dr, dc)`, if it lies inside the grid.
#[inline]
pub(crate) fn offset(r: usize, c: usize, dr: isize, dc: isize, rows: usize, cols: usize) -> Option<(usize, usize)> {
    let nr = r as isize + dr;
    let nc = c as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        None
    } else {
        Some((nr as usize, nc as usize))
    }
}

/// One dilation step: a cell is set if it or any 4-neighbour is set.
pub fn dilate_once(mask: &MaskGrid) -> MaskGrid {
    let rows = mask.height;
    let cols = mask.width;
    let mut out = mask.clone();
    for r in 0..rows {
        for c in 0..cols {
            if mask.get(r, c) {
                continue;
            }
            let hit = N4.iter().any(|&(dr, dc)| {
                offset(r, c, dr, dc, rows, cols).is_some_and(|(nr, nc)| mask.get(nr, nc))
            });
            if hit {
                out.set(r, c, true);
            }
        }
    }
    out
}

/// `radius` successive 4-connected dilations, i.e. every cell within
/// Manhattan distance `radius` of a set cell. Radius 0 returns the mask.
///
/// Computed as a multi-source BFS so the cost is linear in the grid size.
pub fn dilate(mask: &MaskGrid, radius: usize) -> MaskGrid {
    if radius == 0 {
        return mask.clone();
    }
    let rows = mask.height;
    let cols = mask.width;
    let mut dist = vec![usize::MAX; mask.len()];
    let mut queue = VecDeque::new();
    for (i, &m) in mask.data.iter().enumerate() {
        if m {
            dist[i] = 0;
            queue.push_back(i);
        }
    }
    while let Some(i) = queue.pop_front() {
        let d = dist[i];
        if d == radius {
            continue;
        }
        let (r, c) = (i / cols, i % cols);
        for &(dr, dc) in &N4 {
            if let Some((nr, nc)) = offset(r, c, dr, dc, rows, cols) {
                let j = nr * cols + nc;
                if dist[j] == usize::MAX {
                    dist[j] = d + 1;
                    queue.push_back(j);
                }
            }
        }
    }
    let mut out = mask.clone();
    for (o, &d) in out.data.iter_mut().zip(dist.iter()) {
        *o = d != usize::MAX;
    }
    out
}

//! Priority-flood depression filling.
//!
//! Seeds a min-heap with every border cell, then repeatedly pops the lowest
//! visited cell and raises each unvisited D8 neighbour to at least its
//! elevation. The result has a non-decreasing path from every cell to the
//! border, so D8 routing on it leaves no interior pits.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::flow_routing::D8_OFFSETS;
use crate::grid::Grid;

/// Heap entry ordered so that `BinaryHeap` pops the lowest elevation first,
/// breaking ties by row-major index.
#[derive(Debug, Clone, Copy)]
struct FloodCell {
    elev: f32,
    idx: usize,
}

impl PartialEq for FloodCell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodCell {}

impl PartialOrd for FloodCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodCell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elev
            .total_cmp(&self.elev)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Fill closed depressions in `dem`, returning the filled surface.
pub fn fill_sinks_priority_flood(dem: &Grid<f32>) -> Grid<f32> {
    let rows = dem.height;
    let cols = dem.width;
    let mut out = dem.clone();
    if out.is_empty() {
        return out;
    }
    let mut visited = vec![false; rows * cols];
    let mut heap = BinaryHeap::with_capacity(2 * (rows + cols));

    let mut push_border = |idx: usize, heap: &mut BinaryHeap<FloodCell>, out: &Grid<f32>| {
        if !visited[idx] {
            visited[idx] = true;
            heap.push(FloodCell { elev: out.data[idx], idx });
        }
    };
    for r in 0..rows {
        push_border(r * cols, &mut heap, &out);
        push_border(r * cols + cols - 1, &mut heap, &out);
    }
    for c in 0..cols {
        push_border(c, &mut heap, &out);
        push_border((rows - 1) * cols + c, &mut heap, &out);
    }

    while let Some(FloodCell { elev, idx }) = heap.pop() {
        let r = (idx / cols) as isize;
        let c = (idx % cols) as isize;
        for &(dr, dc) in &D8_OFFSETS {
            let nr = r + dr;
            let nc = c + dc;
            if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                continue;
            }
            let j = nr as usize * cols + nc as usize;
            if visited[j] {
                continue;
            }
            visited[j] = true;
            if out.data[j] < elev {
                out.data[j] = elev;
            }
            heap.push(FloodCell { elev: out.data[j], idx: j });
        }
    }
    out
}

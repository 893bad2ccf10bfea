//! D8 flow direction and accumulation.
use std::collections::VecDeque;

use crate::grid::Grid;

/// D8 neighbour offsets `(dr, dc)` in evaluation order. Ties in the
/// steepest-descent search resolve to the earliest entry.
pub const D8_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Flow routing result. Stale as soon as the elevation it came from changes.
#[derive(Debug, Clone)]
pub struct FlowField {
    /// Index into `D8_OFFSETS`; `None` for cells with no downhill neighbour.
    pub direction: Vec<Option<u8>>,
    /// Number of cells draining through each cell, itself included.
    pub accumulation: Vec<f64>,
    pub width: usize,
    pub height: usize,
}

impl FlowField {
    /// Row-major index of the cell `idx` drains into, if any.
    pub fn downstream(&self, idx: usize) -> Option<usize> {
        downstream_of(&self.direction, idx, self.width, self.height)
    }
}

/// Route every cell to the neighbour with the greatest raw elevation drop.
/// Only strictly positive drops count, so flats and pits get `None`.
pub fn d8_flow_direction(dem: &Grid<f32>) -> Vec<Option<u8>> {
    let rows = dem.height;
    let cols = dem.width;
    let mut direction = vec![None; rows * cols];

    for r in 0..rows {
        for c in 0..cols {
            let cur = dem.get(r, c);
            let mut best_drop = 0.0f32;
            let mut best_k = None;
            for (k, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
                let nr = r as isize + dr;
                let nc = c as isize + dc;
                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue;
                }
                let drop = cur - dem.get(nr as usize, nc as usize);
                if drop > best_drop {
                    best_drop = drop;
                    best_k = Some(k as u8);
                }
            }
            direction[r * cols + c] = best_k;
        }
    }
    direction
}

fn downstream_of(direction: &[Option<u8>], idx: usize, cols: usize, rows: usize) -> Option<usize> {
    let k = direction[idx]?;
    let (dr, dc) = D8_OFFSETS[k as usize];
    let nr = (idx / cols) as isize + dr;
    let nc = (idx % cols) as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        return None;
    }
    Some(nr as usize * cols + nc as usize)
}

/// Accumulate drainage area along the direction field.
///
/// Cells are visited in topological order (Kahn's algorithm over the
/// downstream pointers), so a cell is only propagated once every upstream
/// contributor has been added. No recursion; O(cells).
pub fn d8_flow_accumulation(direction: &[Option<u8>], width: usize, height: usize) -> Vec<f64> {
    let n = width * height;
    let mut downstream = vec![usize::MAX; n];
    let mut indegree = vec![0u32; n];
    for i in 0..n {
        if let Some(j) = downstream_of(direction, i, width, height) {
            downstream[i] = j;
            indegree[j] += 1;
        }
    }

    let mut acc = vec![1.0f64; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    while let Some(u) = queue.pop_front() {
        let v = downstream[u];
        if v == usize::MAX {
            continue;
        }
        acc[v] += acc[u];
        indegree[v] -= 1;
        if indegree[v] == 0 {
            queue.push_back(v);
        }
    }
    acc
}

/// Direction plus accumulation in one call.
pub fn compute_d8_flow(dem: &Grid<f32>) -> FlowField {
    let direction = d8_flow_direction(dem);
    let accumulation = d8_flow_accumulation(&direction, dem.width, dem.height);
    FlowField { direction, accumulation, width: dem.width, height: dem.height }
}

// grid.rs: uniform spatial grid for neighbor discovery.
//
// Cell size = interaction radius, so an agent only scans the 3×3×3 = 27
// cells around its own. Rebuilt from scratch every tick; no removal.
// Build: one parallel O(N) pass into a concurrent map, then sealed into a
// plain read-only map with ascending buckets.

use dashmap::DashMap;
use glam::{IVec3, Vec3};
use rayon::prelude::*;
use std::collections::HashMap;

/// Minimum number of agents handed to one rayon task.
pub const PARALLEL_BATCH: usize = 64;

const CELL_MIN: i32 = i32::MIN + 1;
const CELL_MAX: i32 = i32::MAX - 1;

/// Cell coordinate containing `position`: `floor(position / cell_size)` per axis.
///
/// Floors toward negative infinity, so `-0.5` with cell size 1 lands in cell -1.
/// Coordinates are clamped one cell inside the `i32` range so every
/// neighborhood offset stays representable.
#[inline(always)]
pub fn cell_of(position: Vec3, cell_size: f32) -> IVec3 {
    (position / cell_size)
        .floor()
        .as_ivec3()
        .clamp(IVec3::splat(CELL_MIN), IVec3::splat(CELL_MAX))
}

/// The 27 cells formed by offsetting each axis of `cell` by -1, 0 and 1.
/// A center on the `i32` edge is first pulled in by one cell.
#[inline]
pub fn neighborhood(cell: IVec3) -> impl Iterator<Item = IVec3> {
    let cell = cell.clamp(IVec3::splat(CELL_MIN), IVec3::splat(CELL_MAX));
    (-1..=1).flat_map(move |x| {
        (-1..=1).flat_map(move |y| (-1..=1).map(move |z| cell + IVec3::new(x, y, z)))
    })
}

/// Multi-map from cell coordinate to the indices of the agents inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialGrid {
    cell_size: f32,
    buckets: HashMap<IVec3, Vec<u32>>,
    len: usize,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        debug_assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell_size must be positive"
        );
        SpatialGrid {
            cell_size,
            buckets: HashMap::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn cell_of(&self, position: Vec3) -> IVec3 {
        cell_of(position, self.cell_size)
    }

    /// Adds `agent` to the bucket for `cell`. Several agents may share a cell.
    pub fn insert(&mut self, cell: IVec3, agent: u32) {
        self.buckets.entry(cell).or_default().push(agent);
        self.len += 1;
    }

    /// Agents in exactly one cell; empty for cells nobody occupies.
    pub fn bucket(&self, cell: IVec3) -> &[u32] {
        self.buckets.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Visits every agent in the 27-cell neighborhood of `cell`, including
    /// the querying agent itself if it lives there. Callers filter by distance.
    #[inline]
    pub fn for_each_neighbor<F>(&self, cell: IVec3, mut callback: F)
    where
        F: FnMut(u32),
    {
        for neighbor_cell in neighborhood(cell) {
            if let Some(bucket) = self.buckets.get(&neighbor_cell) {
                for &agent in bucket {
                    callback(agent);
                }
            }
        }
    }

    /// Union of the buckets of the 27-cell neighborhood. Missing cells contribute nothing.
    pub fn neighbors_of(&self, cell: IVec3) -> Vec<u32> {
        let mut found = Vec::new();
        self.for_each_neighbor(cell, |agent| found.push(agent));
        found
    }

    /// Occupied cells and their buckets, in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = (IVec3, &[u32])> {
        self.buckets
            .iter()
            .map(|(cell, bucket)| (*cell, bucket.as_slice()))
    }

    /// Number of agent entries across all buckets.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.buckets.len()
    }

    /// Sorts every bucket so scans visit agents in ascending index order
    /// regardless of the order they were inserted in.
    fn seal(&mut self) {
        self.buckets
            .par_iter_mut()
            .for_each(|(_, bucket)| bucket.sort_unstable());
    }
}

/// Concurrent writer for a `SpatialGrid`. Every agent inserts itself
/// independently; `finish` is the barrier that hands back a read-only grid.
pub struct GridBuilder {
    cell_size: f32,
    cells: DashMap<IVec3, Vec<u32>>,
}

impl GridBuilder {
    pub fn new(cell_size: f32, expected_agents: usize) -> Self {
        GridBuilder {
            cell_size,
            cells: DashMap::with_capacity(expected_agents),
        }
    }

    /// Safe to call from many threads at once.
    #[inline]
    pub fn insert(&self, agent: u32, position: Vec3) {
        let cell = cell_of(position, self.cell_size);
        self.cells.entry(cell).or_default().push(agent);
    }

    pub fn finish(self) -> SpatialGrid {
        let mut grid = SpatialGrid::new(self.cell_size);
        for (cell, bucket) in self.cells {
            grid.len += bucket.len();
            grid.buckets.insert(cell, bucket);
        }
        grid.seal();
        grid
    }
}

/// Builds the grid for a position snapshot, one rayon task per batch of agents.
/// Agent `i` is stored under index `i` of `positions`.
pub fn build_grid(positions: &[Vec3], cell_size: f32) -> SpatialGrid {
    let builder = GridBuilder::new(cell_size, positions.len());
    positions
        .par_iter()
        .with_min_len(PARALLEL_BATCH)
        .enumerate()
        .for_each(|(i, position)| builder.insert(i as u32, *position));
    builder.finish()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Hierarchical cross-tile merge.
//!
//! Reconciles connectivity across tile seams with a log-depth n-way (2x2)
//! reduction over both axes. The schedule is precomputed as an immutable
//! [`MergePlan`]; the driver then walks a fixed list of steps. Each step runs
//! a merge pass (atomic seam unions) followed by a flatten pass over the same
//! seams; the flatten is a hard dependency for the next step, enforced by the
//! joining barrier between the two passes.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::connectivity::{CONN_N, CONN_NE, CONN_NW, CONN_SW, CONN_W};
use crate::forest::LabelForest;
use crate::label::Label;
use crate::tile::TileGrid;

/// One iteration of the merge schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeStep {
    /// Merge block height entering this step, in tiles.
    pub vert_block: usize,
    /// Merge block width entering this step, in tiles.
    pub horz_block: usize,
    /// Merge group count along y (0 once the axis is exhausted).
    pub n_vert_merges: usize,
    /// Merge group count along x (0 once the axis is exhausted).
    pub n_horz_merges: usize,
    /// Line workers per merge task, sized so every seam line is covered.
    pub n_line_workers: usize,
}

impl MergeStep {
    /// Number of merge tasks dispatched for this step.
    #[must_use]
    pub fn task_count(&self) -> usize {
        if self.n_vert_merges > 0 && self.n_horz_merges > 0 {
            self.n_vert_merges * self.n_horz_merges
        } else {
            self.n_vert_merges.max(self.n_horz_merges)
        }
    }
}

/// The immutable merge schedule for a tile grid.
///
/// Per axis the iteration budget is `floor(log2(axis_tile_count))`; the plan
/// holds `max` of the two. Block sizes double each step until their axis
/// exhausts its budget, then hold while the other axis continues. The last
/// merge group on an axis absorbs the remainder tiles, so every internal
/// seam is processed exactly once across the whole schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub steps: Vec<MergeStep>,
}

impl MergePlan {
    #[must_use]
    pub fn new(grid: &TileGrid, width: usize, height: usize, local_workers: usize) -> Self {
        let vert_iters = log2_down(grid.n_vert);
        let horz_iters = log2_down(grid.n_horz);
        let iterations = vert_iters.max(horz_iters);

        let mut steps = Vec::with_capacity(iterations);
        let mut vert_block = 1usize;
        let mut horz_block = 1usize;
        for iteration in 0..iterations {
            let group_v = 2 * vert_block;
            let group_h = 2 * horz_block;
            let n_vert_merges = if group_v <= grid.n_vert {
                grid.n_vert / group_v
            } else {
                0
            };
            let n_horz_merges = if group_h <= grid.n_horz {
                grid.n_horz / group_h
            } else {
                0
            };
            debug_assert!(n_vert_merges > 0 || n_horz_merges > 0);

            // Longest seam in the step, in pixels, including the remainder
            // tiles absorbed by the last group on each axis.
            let max_region_v = if n_vert_merges > 0 {
                group_v + (grid.n_vert - n_vert_merges * group_v)
            } else {
                grid.n_vert
            };
            let max_region_h = if n_horz_merges > 0 {
                group_h + (grid.n_horz - n_horz_merges * group_h)
            } else {
                grid.n_horz
            };
            let mut longest_seam = 0usize;
            if n_vert_merges > 0 {
                longest_seam = longest_seam.max((max_region_h * grid.tile_cols).min(width));
            }
            if n_horz_merges > 0 {
                longest_seam = longest_seam.max((max_region_v * grid.tile_rows).min(height));
            }
            let n_line_workers = longest_seam.div_ceil(local_workers).max(1);

            steps.push(MergeStep {
                vert_block,
                horz_block,
                n_vert_merges,
                n_horz_merges,
                n_line_workers,
            });

            if iteration < vert_iters {
                vert_block *= 2;
            }
            if iteration < horz_iters {
                horz_block *= 2;
            }
        }
        Self { steps }
    }

    /// Total scheduled iterations.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.steps.len()
    }
}

fn log2_down(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - 1 - n.leading_zeros()) as usize
    }
}

/// Tile-space bounds of one merge group (exclusive ends).
#[derive(Clone, Copy, Debug)]
struct TaskRegion {
    tv0: usize,
    tv1: usize,
    th0: usize,
    th1: usize,
}

fn task_region(step: &MergeStep, grid: &TileGrid, task: usize) -> TaskRegion {
    let (rv, rh) = if step.n_vert_merges > 0 && step.n_horz_merges > 0 {
        (task / step.n_horz_merges, task % step.n_horz_merges)
    } else if step.n_vert_merges > 0 {
        (task, 0)
    } else {
        (0, task)
    };
    let group_v = 2 * step.vert_block;
    let group_h = 2 * step.horz_block;
    let (tv0, tv1) = if step.n_vert_merges > 0 {
        let tv0 = rv * group_v;
        // The last group absorbs remainder tiles.
        let tv1 = if rv + 1 == step.n_vert_merges {
            grid.n_vert
        } else {
            tv0 + group_v
        };
        (tv0, tv1)
    } else {
        (0, grid.n_vert)
    };
    let (th0, th1) = if step.n_horz_merges > 0 {
        let th0 = rh * group_h;
        let th1 = if rh + 1 == step.n_horz_merges {
            grid.n_horz
        } else {
            th0 + group_h
        };
        (th0, th1)
    } else {
        (0, grid.n_horz)
    };
    TaskRegion { tv0, tv1, th0, th1 }
}

/// Run the whole merge schedule.
///
/// Returns per-iteration failed-union counts when `collect_stats` is set,
/// otherwise an empty vector.
pub fn merge_tiles<L: Label>(
    forest: &LabelForest<'_, L>,
    conn: &[u8],
    width: usize,
    height: usize,
    grid: &TileGrid,
    plan: &MergePlan,
    local_workers: usize,
    collect_stats: bool,
) -> Vec<u64> {
    let mut retries = Vec::with_capacity(if collect_stats { plan.steps.len() } else { 0 });
    for step in &plan.steps {
        let failed = AtomicU64::new(0);
        let dispatch = step.task_count() * step.n_line_workers;

        (0..dispatch).into_par_iter().for_each(|idx| {
            let region = task_region(step, grid, idx / step.n_line_workers);
            let worker = idx % step.n_line_workers;
            let local = merge_worker(
                forest,
                conn,
                width,
                height,
                grid,
                step,
                region,
                worker,
                local_workers,
            );
            if collect_stats && local > 0 {
                failed.fetch_add(local, Ordering::Relaxed);
            }
        });

        // Flatten every root touched at the seams before the next iteration
        // looks anything up.
        (0..dispatch).into_par_iter().for_each(|idx| {
            let region = task_region(step, grid, idx / step.n_line_workers);
            let worker = idx % step.n_line_workers;
            flatten_worker(
                forest,
                width,
                height,
                grid,
                step,
                region,
                worker,
                local_workers,
            );
        });

        if collect_stats {
            retries.push(failed.load(Ordering::Relaxed));
        }
    }
    retries
}

/// Union across every seam line of one merge group assigned to `worker`.
///
/// Seam coverage: for a horizontal seam the south-side pixel's N/NW/NE bits
/// enumerate every crossing edge; for a vertical seam the east-side pixel's
/// W/NW/SW bits do. Set bits imply the neighbor is in bounds.
#[allow(clippy::too_many_arguments)]
fn merge_worker<L: Label>(
    forest: &LabelForest<'_, L>,
    conn: &[u8],
    width: usize,
    height: usize,
    grid: &TileGrid,
    step: &MergeStep,
    region: TaskRegion,
    worker: usize,
    chunk: usize,
) -> u64 {
    let n_workers = step.n_line_workers;
    let mut failed = 0u64;

    if step.n_vert_merges > 0 {
        let x_start = region.th0 * grid.tile_cols;
        let x_end = (region.th1 * grid.tile_cols).min(width);
        let mut tb = region.tv0 + step.vert_block;
        while tb < region.tv1 {
            let y = tb * grid.tile_rows;
            debug_assert!(y < height);
            let mut start = x_start + worker * chunk;
            while start < x_end {
                let end = (start + chunk).min(x_end);
                for x in start..end {
                    let i = y * width + x;
                    let mask = conn[i];
                    if mask & CONN_N != 0 {
                        failed += forest.union(i, i - width);
                    }
                    if mask & CONN_NW != 0 {
                        failed += forest.union(i, i - width - 1);
                    }
                    if mask & CONN_NE != 0 {
                        failed += forest.union(i, i - width + 1);
                    }
                }
                start += n_workers * chunk;
            }
            tb += step.vert_block;
        }
    }

    if step.n_horz_merges > 0 {
        let y_start = region.tv0 * grid.tile_rows;
        let y_end = (region.tv1 * grid.tile_rows).min(height);
        let mut tb = region.th0 + step.horz_block;
        while tb < region.th1 {
            let x = tb * grid.tile_cols;
            debug_assert!(x < width);
            let mut start = y_start + worker * chunk;
            while start < y_end {
                let end = (start + chunk).min(y_end);
                for y in start..end {
                    let i = y * width + x;
                    let mask = conn[i];
                    if mask & CONN_W != 0 {
                        failed += forest.union(i, i - 1);
                    }
                    if mask & CONN_NW != 0 {
                        failed += forest.union(i, i - width - 1);
                    }
                    if mask & CONN_SW != 0 {
                        failed += forest.union(i, i + width - 1);
                    }
                }
                start += n_workers * chunk;
            }
            tb += step.horz_block;
        }
    }

    failed
}

/// Re-point both sides of every seam line directly at their roots.
#[allow(clippy::too_many_arguments)]
fn flatten_worker<L: Label>(
    forest: &LabelForest<'_, L>,
    width: usize,
    height: usize,
    grid: &TileGrid,
    step: &MergeStep,
    region: TaskRegion,
    worker: usize,
    chunk: usize,
) {
    let n_workers = step.n_line_workers;

    if step.n_vert_merges > 0 {
        let x_start = region.th0 * grid.tile_cols;
        let x_end = (region.th1 * grid.tile_cols).min(width);
        let mut tb = region.tv0 + step.vert_block;
        while tb < region.tv1 {
            let y = tb * grid.tile_rows;
            let mut start = x_start + worker * chunk;
            while start < x_end {
                let end = (start + chunk).min(x_end);
                for x in start..end {
                    let i = y * width + x;
                    forest.flatten(i);
                    forest.flatten(i - width);
                }
                start += n_workers * chunk;
            }
            tb += step.vert_block;
        }
    }

    if step.n_horz_merges > 0 {
        let y_start = region.tv0 * grid.tile_rows;
        let y_end = (region.tv1 * grid.tile_rows).min(height);
        let mut tb = region.th0 + step.horz_block;
        while tb < region.th1 {
            let x = tb * grid.tile_cols;
            let mut start = y_start + worker * chunk;
            while start < y_end {
                let end = (start + chunk).min(y_end);
                for y in start..end {
                    let i = y * width + x;
                    forest.flatten(i);
                    forest.flatten(i - 1);
                }
                start += n_workers * chunk;
            }
            tb += step.horz_block;
        }
    }
}

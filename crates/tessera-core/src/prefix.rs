//! Foreground-root marking and two-level exclusive prefix sums.
//!
//! Assigns each foreground root a dense identifier in increasing scanline
//! order of the root's linear index, and produces the total component count.
//! The pixel space is split into fixed-size blocks distributed over a bounded
//! number of parallel workers (the configured target parallelism); block
//! totals are scanned once to produce per-worker carries.

use rayon::prelude::*;

use crate::forest::LabelForest;
use crate::grid::GridView;
use crate::label::{Label, Pixel};

/// Partitioning of the pixel space into per-worker block spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPartition {
    /// Pixels per block (the local worker count).
    pub block_size: usize,
    /// Blocks assigned to each worker.
    pub blocks_per_worker: usize,
    /// Bounded worker count actually dispatched.
    pub n_workers: usize,
}

impl BlockPartition {
    #[must_use]
    pub fn new(n_pixels: usize, local_workers: usize, worker_groups: usize) -> Self {
        let block_size = local_workers;
        let n_blocks = n_pixels.div_ceil(block_size).max(1);
        let blocks_per_worker = n_blocks.div_ceil(worker_groups);
        let n_workers = n_blocks.div_ceil(blocks_per_worker);
        Self {
            block_size,
            blocks_per_worker,
            n_workers,
        }
    }

    /// Pixels covered by one worker.
    #[must_use]
    pub fn span(&self) -> usize {
        self.blocks_per_worker * self.block_size
    }
}

#[inline(always)]
fn is_foreground<P: Pixel>(value: P, background: Option<P>) -> bool {
    background.is_none_or(|b| value != b)
}

/// Fused pre-pass: store the foreground-root flag of every pixel into the
/// prefix buffer, ahead of the scan that consumes it.
pub fn mark_root_flags<P: Pixel, L: Label>(
    img: &GridView<'_, P>,
    forest: &LabelForest<'_, L>,
    background: Option<P>,
    flags: &mut [L],
    band_rows: usize,
) {
    let width = img.width;
    flags
        .par_chunks_mut(width * band_rows)
        .enumerate()
        .for_each(|(band, chunk)| {
            let y0 = band * band_rows;
            for (k, flag) in chunk.iter_mut().enumerate() {
                let i = y0 * width + k;
                let y = i / width;
                let x = i % width;
                let root = forest.parent(i) == i && is_foreground(img.row(y)[x], background);
                *flag = L::from_index(usize::from(root));
            }
        });
}

/// Two-level exclusive prefix sum over foreground-root flags.
///
/// With `fused` set, flags are read from `prefix` (written there by
/// [`mark_root_flags`]); otherwise they are derived inline. Both forms yield
/// identical results. On return `prefix[i]` holds the dense 0-based offset
/// valid at every root pixel, and the grand total is the component count.
pub fn compute_prefix_sums<P: Pixel, L: Label>(
    img: &GridView<'_, P>,
    forest: &LabelForest<'_, L>,
    background: Option<P>,
    fused: bool,
    partition: BlockPartition,
    prefix: &mut [L],
    block_sums: &mut [usize],
) -> usize {
    debug_assert_eq!(block_sums.len(), partition.n_workers);
    let width = img.width;
    let span = partition.span();

    // Pass 1: per-worker local exclusive scans plus span totals.
    prefix
        .par_chunks_mut(span)
        .zip(block_sums.par_iter_mut())
        .enumerate()
        .for_each(|(worker, (chunk, total))| {
            let base = worker * span;
            let mut running = 0usize;
            for (k, cell) in chunk.iter_mut().enumerate() {
                let flag = if fused {
                    cell.index()
                } else {
                    let i = base + k;
                    let y = i / width;
                    let x = i % width;
                    usize::from(forest.parent(i) == i && is_foreground(img.row(y)[x], background))
                };
                *cell = L::from_index(running);
                running += flag;
            }
            *total = running;
        });

    // Pass 2: single exclusive scan over the span totals.
    let mut carry = 0usize;
    for total in block_sums.iter_mut() {
        let count = *total;
        *total = carry;
        carry += count;
    }

    // Pass 3: add each worker's global carry back into its span.
    prefix
        .par_chunks_mut(span)
        .zip(block_sums.par_iter())
        .for_each(|(chunk, &carry)| {
            if carry > 0 {
                for cell in chunk {
                    *cell = L::from_index(cell.index() + carry);
                }
            }
        });

    carry
}

//! Tile-parallel connected component labeling for 2D pixel grids.
//!
//! This crate labels connected components with a multi-stage, data-parallel
//! union-find pipeline. Work is dispatched as wide parallel passes over
//! disjoint regions; the join of each pass is the barrier that makes its
//! writes visible to the next stage.
//!
//! # Architecture Overview
//!
//! 1. **Connectivity map**: per-pixel neighbor bitmasks under the configured
//!    adjacency rule (value equality, 4- or 8-connectivity).
//! 2. **Tile labeling**: local union-find inside fixed-size tiles,
//!    producing provisional parent pointers.
//! 3. **Tile merging**: a log-depth 2x2 reduction over both axes; seam
//!    unions use an atomic compare-and-swap loop, each iteration followed by
//!    a seam flatten.
//! 4. **Path compaction**: one global pointer-halving pass; every cell ends
//!    one hop from its root.
//! 5. **Label compaction**: foreground roots get dense IDs via a two-level
//!    exclusive prefix sum bounded by the configured parallelism.
//! 6. **Relabeling**: the output field is rewritten with dense labels that
//!    increase in scanline order of each component's root.
//!
//! # Configuration
//!
//! The pipeline is constructed once per (shape, configuration) pair and
//! reused across images of identical shape; see
//! [`config::PipelineConfig`]. Pixel and label element widths are generic
//! parameters, fixed per instantiation.
//!
//! # Example
//!
//! ```
//! use tessera_core::{GridView, LabelingPipeline, PipelineConfig};
//!
//! // 0 = background, everything else labeled by value equality.
//! let pixels: Vec<u8> = vec![
//!     1, 1, 0, 2, 2, //
//!     1, 0, 0, 2, 2,
//! ];
//! let img = GridView::new(&pixels, 5, 2, 5).unwrap();
//! let config = PipelineConfig::builder().background(0).build();
//! let mut pipeline = LabelingPipeline::<u8, u32>::new(5, 2, config).unwrap();
//!
//! let result = pipeline.label(&img).unwrap();
//! assert_eq!(result.count, 2);
//! assert_eq!(result.labels, vec![1, 1, 0, 2, 2, 1, 0, 0, 2, 2]);
//! ```

/// Global path compaction pass.
pub mod compact;
/// Configuration types for the pipeline.
pub mod config;
/// Connectivity map construction.
pub mod connectivity;
/// Output consistency validation.
pub mod diagnostics;
/// Shared atomic union-find forest.
pub mod forest;
/// Stride-aware input views.
pub mod grid;
/// Pixel and label element traits.
pub mod label;
/// Hierarchical cross-tile merge.
pub mod merge;
/// Root marking and two-level prefix sums.
pub mod prefix;
/// Final dense relabeling.
pub mod relabel;
/// Utilities for testing and synthetic data generation.
pub mod test_utils;
/// Per-tile provisional labeling.
pub mod tile;

use std::marker::PhantomData;

use bumpalo::Bump;

pub use crate::config::{ConfigError, Connectivity, PipelineConfig};
pub use crate::grid::{GridError, GridView};
pub use crate::label::{Label, Pixel};

use crate::forest::LabelForest;
use crate::merge::MergePlan;
use crate::prefix::BlockPartition;
use crate::tile::TileGrid;

/// Per-stage timings and merge statistics for a single labeling run.
#[derive(Clone, Debug, Default)]
pub struct PipelineStats {
    /// Time spent building the connectivity map, in milliseconds.
    pub connectivity_ms: f64,
    /// Time spent labeling tiles in milliseconds.
    pub tile_label_ms: f64,
    /// Time spent in the merge schedule in milliseconds.
    pub merge_ms: f64,
    /// Time spent in global path compaction in milliseconds.
    pub compact_ms: f64,
    /// Time spent marking roots and scanning prefix sums in milliseconds.
    pub prefix_ms: f64,
    /// Time spent writing the final label field in milliseconds.
    pub relabel_ms: f64,
    /// Total pipeline time in milliseconds.
    pub total_ms: f64,
    /// Scheduled merge iterations.
    pub merge_iterations: usize,
    /// Failed seam-union attempts per merge iteration. Empty unless
    /// merge statistics are enabled in the configuration.
    pub merge_retries: Vec<u64>,
}

/// Result of labeling one image.
#[derive(Clone, Debug)]
pub struct Labeling<L: Label> {
    /// Dense label field in row-major order; background pixels carry 0.
    pub labels: Vec<L>,
    /// Number of foreground components. Foreground labels are `1..=count`.
    pub count: usize,
    /// Per-stage timings and optional merge statistics.
    pub stats: PipelineStats,
}

/// Full result of a labeling run including intermediate data for debugging.
#[derive(Clone, Debug)]
pub struct FullLabeling<L: Label> {
    /// The regular labeling output.
    pub labeling: Labeling<L>,
    /// The connectivity bitmask map.
    pub connectivity: Vec<u8>,
    /// The compacted label forest (parent pointer per pixel).
    pub forest: Vec<L>,
    /// Dense offsets per pixel (valid at root pixels).
    pub prefix_sums: Vec<L>,
}

/// Errors from pipeline construction or a labeling run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid construction-time configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Invalid input view.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// The input does not match the construction-time shape.
    #[error("input is {got_width}x{got_height} but the pipeline was built for {width}x{height}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
}

/// The labeling pipeline.
///
/// Holds reusable state (scratch arena, tile geometry, the immutable merge
/// schedule and prefix-sum partitioning) for one image shape. Construct once
/// per (shape, configuration) pair and reuse across images; buffers are
/// recycled between runs.
pub struct LabelingPipeline<P: Pixel, L: Label> {
    arena: Bump,
    config: PipelineConfig<P>,
    width: usize,
    height: usize,
    grid: TileGrid,
    plan: MergePlan,
    partition: BlockPartition,
    label_marker: PhantomData<L>,
}

impl<P: Pixel, L: Label> LabelingPipeline<P, L> {
    /// Create a pipeline for images of `width` x `height` pixels.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for non-positive dimensions, zero sizing
    /// constants, a workgroup tile larger than the local worker budget, or a
    /// label type too narrow to index every pixel. Nothing is silently
    /// corrected.
    pub fn new(
        width: usize,
        height: usize,
        config: PipelineConfig<P>,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyDimensions { width, height });
        }
        config.validate()?;
        let n_pixels = width
            .checked_mul(height)
            .filter(|&n| n <= L::MAX_INDEX)
            .ok_or(ConfigError::LabelTooNarrow {
                label: L::NAME,
                pixels: width.saturating_mul(height),
            })?;

        let grid = TileGrid::new(width, height, config.tile_cols(), config.tile_rows());
        let plan = MergePlan::new(&grid, width, height, config.local_workers);
        let partition = BlockPartition::new(n_pixels, config.local_workers, config.worker_groups);

        Ok(Self {
            arena: Bump::new(),
            config,
            width,
            height,
            grid,
            plan,
            partition,
            label_marker: PhantomData,
        })
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig<P> {
        &self.config
    }

    /// The precomputed merge schedule.
    pub fn merge_plan(&self) -> &MergePlan {
        &self.plan
    }

    /// Label one image, returning the dense label field and component count.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShapeMismatch`] when the view's dimensions
    /// differ from the construction-time shape. A failed run invalidates the
    /// result as a whole; there is no partial output and no retry.
    pub fn label(&mut self, img: &GridView<'_, P>) -> Result<Labeling<L>, PipelineError> {
        Ok(self.run(img, false)?.labeling)
    }

    /// Label one image and capture intermediate buffers for debugging.
    ///
    /// # Errors
    ///
    /// Same as [`label`](Self::label).
    pub fn label_full(&mut self, img: &GridView<'_, P>) -> Result<FullLabeling<L>, PipelineError> {
        self.run(img, true)
    }

    fn run(
        &mut self,
        img: &GridView<'_, P>,
        capture_debug: bool,
    ) -> Result<FullLabeling<L>, PipelineError> {
        if img.width != self.width || img.height != self.height {
            return Err(PipelineError::ShapeMismatch {
                width: self.width,
                height: self.height,
                got_width: img.width,
                got_height: img.height,
            });
        }

        let mut stats = PipelineStats::default();
        let start_total = std::time::Instant::now();

        self.arena.reset();
        let n_pixels = self.width * self.height;

        // 1. Connectivity map
        let start = std::time::Instant::now();
        let conn = self.arena.alloc_slice_fill_copy(n_pixels, 0u8);
        {
            let _span = tracing::info_span!("connectivity").entered();
            connectivity::build_connectivity_map(img, self.config.connectivity, conn);
        }
        stats.connectivity_ms = start.elapsed().as_secs_f64() * 1000.0;

        // 2. Tile labeling
        let start = std::time::Instant::now();
        let forest: LabelForest<'_, L> = LabelForest::new_in(&self.arena, n_pixels);
        {
            let _span = tracing::info_span!("label_tiles").entered();
            tile::label_tiles(&forest, conn, self.width, self.height, &self.grid);
        }
        stats.tile_label_ms = start.elapsed().as_secs_f64() * 1000.0;

        // 3. Hierarchical merge
        let start = std::time::Instant::now();
        {
            let _span = tracing::info_span!("merge_tiles").entered();
            stats.merge_retries = merge::merge_tiles(
                &forest,
                conn,
                self.width,
                self.height,
                &self.grid,
                &self.plan,
                self.config.local_workers,
                self.config.merge_stats,
            );
        }
        stats.merge_iterations = self.plan.iterations();
        stats.merge_ms = start.elapsed().as_secs_f64() * 1000.0;

        // 4. Global path compaction
        let start = std::time::Instant::now();
        {
            let _span = tracing::info_span!("compact_paths").entered();
            compact::compact_paths(&forest, self.width, self.height, self.config.compact_tile_rows);
        }
        stats.compact_ms = start.elapsed().as_secs_f64() * 1000.0;

        // 5. Root marking + prefix sums
        let start = std::time::Instant::now();
        let prefix_sums = self.arena.alloc_slice_fill_copy(n_pixels, L::SENTINEL);
        let block_sums = self
            .arena
            .alloc_slice_fill_copy(self.partition.n_workers, 0usize);
        let count = {
            let _span = tracing::info_span!("prefix_sums").entered();
            if self.config.fused_mark {
                prefix::mark_root_flags(
                    img,
                    &forest,
                    self.config.background,
                    prefix_sums,
                    self.config.compact_tile_rows,
                );
            }
            prefix::compute_prefix_sums(
                img,
                &forest,
                self.config.background,
                self.config.fused_mark,
                self.partition,
                prefix_sums,
                block_sums,
            )
        };
        stats.prefix_ms = start.elapsed().as_secs_f64() * 1000.0;

        // 6. Relabel in scanline-root order
        let start = std::time::Instant::now();
        let mut labels = vec![L::SENTINEL; n_pixels];
        {
            let _span = tracing::info_span!("relabel").entered();
            relabel::relabel(
                img,
                &forest,
                prefix_sums,
                self.config.background,
                &mut labels,
                self.config.compact_tile_rows,
            );
        }
        stats.relabel_ms = start.elapsed().as_secs_f64() * 1000.0;
        stats.total_ms = start_total.elapsed().as_secs_f64() * 1000.0;

        Ok(FullLabeling {
            labeling: Labeling {
                labels,
                count,
                stats,
            },
            connectivity: if capture_debug {
                conn.to_vec()
            } else {
                Vec::new()
            },
            forest: if capture_debug {
                forest.snapshot()
            } else {
                Vec::new()
            },
            prefix_sums: if capture_debug {
                prefix_sums.to_vec()
            } else {
                Vec::new()
            },
        })
    }
}

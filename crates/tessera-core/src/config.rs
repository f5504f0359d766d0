//! Configuration types for the labeling pipeline.
//!
//! [`PipelineConfig`] is pipeline-level configuration, immutable after the
//! pipeline is constructed. Invalid combinations are rejected by
//! [`LabelingPipeline::new`](crate::LabelingPipeline::new) — never silently
//! corrected.

use crate::label::Pixel;

/// Connectivity rule for neighbor adjacency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    /// 4-connectivity: pixels connect horizontally and vertically only.
    Four,
    /// 8-connectivity: pixels connect horizontally, vertically, and
    /// diagonally.
    Eight,
}

/// Error raised for invalid construction-time configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Image dimensions must both be positive.
    #[error("grid dimensions must be positive (got {width}x{height})")]
    EmptyDimensions { width: usize, height: usize },
    /// A sizing constant was zero.
    #[error("{name} must be positive")]
    ZeroConstant { name: &'static str },
    /// The workgroup tile requires more workers than the local budget allows.
    #[error("workgroup tile ({tile} workers) exceeds the local worker budget ({local_workers})")]
    TileExceedsWorkers { tile: usize, local_workers: usize },
    /// The label element type cannot index every pixel of the grid.
    #[error("label type {label} is too narrow to index {pixels} pixels")]
    LabelTooNarrow { label: &'static str, pixels: usize },
}

/// Pipeline-level configuration.
///
/// These settings shape the dispatch geometry of every pass and are immutable
/// after the pipeline is constructed. Use the builder for ergonomic
/// construction.
///
/// # Example
/// ```
/// use tessera_core::config::{Connectivity, PipelineConfig};
///
/// let config: PipelineConfig<u8> = PipelineConfig::builder()
///     .connectivity(Connectivity::Eight)
///     .background(0)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig<P: Pixel> {
    /// Workers along x in one labeling workgroup (default: 16).
    pub workgroup_tile_x: usize,
    /// Workers along y in one labeling workgroup (default: 16).
    pub workgroup_tile_y: usize,
    /// Pixels along x handled by each worker (default: 4).
    pub workitem_repeat_x: usize,
    /// Pixels along y handled by each worker (default: 1).
    pub workitem_repeat_y: usize,
    /// Row band height for the compaction-family passes (default: 32).
    pub compact_tile_rows: usize,
    /// Column granularity of the compaction-family passes (default: 8).
    pub compact_tile_cols: usize,
    /// Target parallelism degree: worker groups sharing the prefix-sum work
    /// (default: 64).
    pub worker_groups: usize,
    /// Preferred local worker count per group; also the seam line-worker
    /// granularity (default: 256).
    pub local_workers: usize,
    /// Precompute foreground-root flags in a dedicated pass before the
    /// prefix sums (default: true). Output is identical either way.
    pub fused_mark: bool,
    /// Count failed seam-union attempts per merge iteration (default: false).
    pub merge_stats: bool,
    /// Neighbor adjacency rule (default: 4-connectivity).
    pub connectivity: Connectivity,
    /// Pixel value treated as background. Pixels equal to it receive the
    /// sentinel output label. `None` means every pixel is foreground.
    pub background: Option<P>,
}

impl<P: Pixel> Default for PipelineConfig<P> {
    fn default() -> Self {
        Self {
            workgroup_tile_x: 16,
            workgroup_tile_y: 16,
            workitem_repeat_x: 4,
            workitem_repeat_y: 1,
            compact_tile_rows: 32,
            compact_tile_cols: 8,
            worker_groups: 64,
            local_workers: 256,
            fused_mark: true,
            merge_stats: false,
            connectivity: Connectivity::Four,
            background: None,
        }
    }
}

impl<P: Pixel> PipelineConfig<P> {
    /// Create a new builder for `PipelineConfig`.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder<P> {
        PipelineConfigBuilder::default()
    }

    /// Tile width in pixels: workgroup width times per-worker repeat.
    #[must_use]
    pub fn tile_cols(&self) -> usize {
        self.workgroup_tile_x * self.workitem_repeat_x
    }

    /// Tile height in pixels: workgroup height times per-worker repeat.
    #[must_use]
    pub fn tile_rows(&self) -> usize {
        self.workgroup_tile_y * self.workitem_repeat_y
    }

    /// Validate the sizing constants. Dimension and label-width checks live
    /// in [`LabelingPipeline::new`](crate::LabelingPipeline::new), which
    /// knows the grid shape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let constants = [
            ("workgroup_tile_x", self.workgroup_tile_x),
            ("workgroup_tile_y", self.workgroup_tile_y),
            ("workitem_repeat_x", self.workitem_repeat_x),
            ("workitem_repeat_y", self.workitem_repeat_y),
            ("compact_tile_rows", self.compact_tile_rows),
            ("compact_tile_cols", self.compact_tile_cols),
            ("worker_groups", self.worker_groups),
            ("local_workers", self.local_workers),
        ];
        for (name, value) in constants {
            if value == 0 {
                return Err(ConfigError::ZeroConstant { name });
            }
        }
        let tile = self.workgroup_tile_x * self.workgroup_tile_y;
        if tile > self.local_workers {
            return Err(ConfigError::TileExceedsWorkers {
                tile,
                local_workers: self.local_workers,
            });
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder<P: Pixel> {
    workgroup_tile_x: Option<usize>,
    workgroup_tile_y: Option<usize>,
    workitem_repeat_x: Option<usize>,
    workitem_repeat_y: Option<usize>,
    compact_tile_rows: Option<usize>,
    compact_tile_cols: Option<usize>,
    worker_groups: Option<usize>,
    local_workers: Option<usize>,
    fused_mark: Option<bool>,
    merge_stats: Option<bool>,
    connectivity: Option<Connectivity>,
    background: Option<P>,
}

impl<P: Pixel> Default for PipelineConfigBuilder<P> {
    fn default() -> Self {
        Self {
            workgroup_tile_x: None,
            workgroup_tile_y: None,
            workitem_repeat_x: None,
            workitem_repeat_y: None,
            compact_tile_rows: None,
            compact_tile_cols: None,
            worker_groups: None,
            local_workers: None,
            fused_mark: None,
            merge_stats: None,
            connectivity: None,
            background: None,
        }
    }
}

impl<P: Pixel> PipelineConfigBuilder<P> {
    /// Set the workgroup tile width (workers along x).
    #[must_use]
    pub fn workgroup_tile_x(mut self, workers: usize) -> Self {
        self.workgroup_tile_x = Some(workers);
        self
    }

    /// Set the workgroup tile height (workers along y).
    #[must_use]
    pub fn workgroup_tile_y(mut self, workers: usize) -> Self {
        self.workgroup_tile_y = Some(workers);
        self
    }

    /// Set how many pixels along x each worker handles.
    #[must_use]
    pub fn workitem_repeat_x(mut self, pixels: usize) -> Self {
        self.workitem_repeat_x = Some(pixels);
        self
    }

    /// Set how many pixels along y each worker handles.
    #[must_use]
    pub fn workitem_repeat_y(mut self, pixels: usize) -> Self {
        self.workitem_repeat_y = Some(pixels);
        self
    }

    /// Set the row band height of the compaction-family passes.
    #[must_use]
    pub fn compact_tile_rows(mut self, rows: usize) -> Self {
        self.compact_tile_rows = Some(rows);
        self
    }

    /// Set the column granularity of the compaction-family passes.
    #[must_use]
    pub fn compact_tile_cols(mut self, cols: usize) -> Self {
        self.compact_tile_cols = Some(cols);
        self
    }

    /// Set the target parallelism degree (worker-group count).
    #[must_use]
    pub fn worker_groups(mut self, groups: usize) -> Self {
        self.worker_groups = Some(groups);
        self
    }

    /// Set the preferred local worker count per group.
    #[must_use]
    pub fn local_workers(mut self, workers: usize) -> Self {
        self.local_workers = Some(workers);
        self
    }

    /// Enable or disable the fused root-marking pre-pass.
    #[must_use]
    pub fn fused_mark(mut self, enable: bool) -> Self {
        self.fused_mark = Some(enable);
        self
    }

    /// Enable or disable merge-conflict statistics.
    #[must_use]
    pub fn merge_stats(mut self, enable: bool) -> Self {
        self.merge_stats = Some(enable);
        self
    }

    /// Set the neighbor adjacency rule.
    #[must_use]
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Set the background pixel value.
    #[must_use]
    pub fn background(mut self, value: P) -> Self {
        self.background = Some(value);
        self
    }

    /// Build the configuration, using defaults for unset fields.
    #[must_use]
    pub fn build(self) -> PipelineConfig<P> {
        let d = PipelineConfig::default();
        PipelineConfig {
            workgroup_tile_x: self.workgroup_tile_x.unwrap_or(d.workgroup_tile_x),
            workgroup_tile_y: self.workgroup_tile_y.unwrap_or(d.workgroup_tile_y),
            workitem_repeat_x: self.workitem_repeat_x.unwrap_or(d.workitem_repeat_x),
            workitem_repeat_y: self.workitem_repeat_y.unwrap_or(d.workitem_repeat_y),
            compact_tile_rows: self.compact_tile_rows.unwrap_or(d.compact_tile_rows),
            compact_tile_cols: self.compact_tile_cols.unwrap_or(d.compact_tile_cols),
            worker_groups: self.worker_groups.unwrap_or(d.worker_groups),
            local_workers: self.local_workers.unwrap_or(d.local_workers),
            fused_mark: self.fused_mark.unwrap_or(d.fused_mark),
            merge_stats: self.merge_stats.unwrap_or(d.merge_stats),
            connectivity: self.connectivity.unwrap_or(d.connectivity),
            background: self.background.or(d.background),
        }
    }
}

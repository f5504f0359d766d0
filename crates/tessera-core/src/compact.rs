//! Global path compaction.
//!
//! One parallel pass after the merge schedule completes; afterwards every
//! forest cell points directly at its root, so downstream passes do a single
//! load instead of a walk. Independent of the merger's partial flattens.

use rayon::prelude::*;

use crate::forest::LabelForest;
use crate::label::Label;

/// Re-point every cell directly at its root using pointer halving.
pub fn compact_paths<L: Label>(
    forest: &LabelForest<'_, L>,
    width: usize,
    height: usize,
    band_rows: usize,
) {
    let n_bands = height.div_ceil(band_rows);
    (0..n_bands).into_par_iter().for_each(|band| {
        let y0 = band * band_rows;
        let y1 = (y0 + band_rows).min(height);
        for i in y0 * width..y1 * width {
            forest.compact(i);
        }
    });
}

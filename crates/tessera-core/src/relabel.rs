//! Final dense relabeling.
//!
//! Every pixel follows its (already direct) root pointer and looks up the
//! root's dense offset from the prefix sums. Because unions keep the minimum
//! linear index as the root and the prefix scan runs in scanline order,
//! output IDs increase monotonically with root scanline position — the
//! output is deterministic regardless of merge execution order.

use rayon::prelude::*;

use crate::forest::LabelForest;
use crate::grid::GridView;
use crate::label::{Label, Pixel};

/// Write the final label field: `prefix[root] + 1` for foreground pixels,
/// the sentinel (0) otherwise.
pub fn relabel<P: Pixel, L: Label>(
    img: &GridView<'_, P>,
    forest: &LabelForest<'_, L>,
    prefix: &[L],
    background: Option<P>,
    out: &mut [L],
    band_rows: usize,
) {
    let width = img.width;
    out.par_chunks_mut(width * band_rows)
        .enumerate()
        .for_each(|(band, chunk)| {
            let y0 = band * band_rows;
            for (k, cell) in chunk.iter_mut().enumerate() {
                let i = y0 * width + k;
                let y = i / width;
                let x = i % width;
                // Pixels in one component share a value, so the pixel's own
                // foreground test matches its root's.
                let foreground = background.is_none_or(|b| img.row(y)[x] != b);
                *cell = if foreground {
                    L::from_index(prefix[forest.parent(i)].index() + 1)
                } else {
                    L::SENTINEL
                };
            }
        });
}

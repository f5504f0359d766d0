//! Output consistency validation.
//!
//! Cross-checks a final label field against the connectivity map: any
//! neighbor marked connected must share the pixel's final label. Used by
//! tests and debugging builds, not on the production path.

use rayon::prelude::*;

use crate::connectivity::DIRECTIONS;
use crate::label::Label;

/// Count (pixel, direction) pairs whose labels disagree with the
/// connectivity map. Zero for any consistent labeling.
#[must_use]
pub fn count_label_mismatches<L: Label>(
    labels: &[L],
    conn: &[u8],
    width: usize,
    height: usize,
) -> u64 {
    debug_assert_eq!(labels.len(), width * height);
    debug_assert_eq!(conn.len(), width * height);
    labels
        .par_chunks(width)
        .enumerate()
        .map(|(y, row)| {
            let mut mismatches = 0u64;
            for (x, &label) in row.iter().enumerate() {
                let mask = conn[y * width + x];
                if mask == 0 {
                    continue;
                }
                for (bit, dx, dy) in DIRECTIONS {
                    if mask & bit == 0 {
                        continue;
                    }
                    // Set bits guarantee the neighbor is in bounds.
                    let nx = x.wrapping_add_signed(dx);
                    let ny = y.wrapping_add_signed(dy);
                    if labels[ny * width + nx] != label {
                        mismatches += 1;
                    }
                }
            }
            mismatches
        })
        .sum()
}

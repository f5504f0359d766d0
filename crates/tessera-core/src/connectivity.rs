//! Connectivity map construction.
//!
//! One mask byte per pixel, one bit per neighbor direction, set when the
//! neighbor exists and holds an equal value. The map is written once here and
//! read by the tile labeler, the merger, and diagnostics. A set bit implies
//! the neighbor is in bounds — downstream passes rely on that and do not
//! re-check.

use multiversion::multiversion;
use rayon::prelude::*;

use crate::config::Connectivity;
use crate::grid::GridView;
use crate::label::Pixel;

/// West neighbor (x-1, y).
pub const CONN_W: u8 = 1 << 0;
/// East neighbor (x+1, y).
pub const CONN_E: u8 = 1 << 1;
/// North neighbor (x, y-1).
pub const CONN_N: u8 = 1 << 2;
/// South neighbor (x, y+1).
pub const CONN_S: u8 = 1 << 3;
/// North-west neighbor (x-1, y-1).
pub const CONN_NW: u8 = 1 << 4;
/// North-east neighbor (x+1, y-1).
pub const CONN_NE: u8 = 1 << 5;
/// South-west neighbor (x-1, y+1).
pub const CONN_SW: u8 = 1 << 6;
/// South-east neighbor (x+1, y+1).
pub const CONN_SE: u8 = 1 << 7;

/// All direction bits with their (dx, dy) offsets.
pub(crate) const DIRECTIONS: [(u8, isize, isize); 8] = [
    (CONN_W, -1, 0),
    (CONN_E, 1, 0),
    (CONN_N, 0, -1),
    (CONN_S, 0, 1),
    (CONN_NW, -1, -1),
    (CONN_NE, 1, -1),
    (CONN_SW, -1, 1),
    (CONN_SE, 1, 1),
];

/// Build the connectivity map for the whole image.
///
/// Embarrassingly parallel: rows are written by disjoint workers, each
/// reading only its own and the adjacent image rows.
pub fn build_connectivity_map<P: Pixel>(
    img: &GridView<'_, P>,
    connectivity: Connectivity,
    out: &mut [u8],
) {
    debug_assert_eq!(out.len(), img.width * img.height);
    let eight = connectivity == Connectivity::Eight;
    let height = img.height;
    out.par_chunks_mut(img.width)
        .enumerate()
        .for_each(|(y, dst)| {
            let row = img.row(y);
            let above = (y > 0).then(|| img.row(y - 1));
            let below = (y + 1 < height).then(|| img.row(y + 1));
            connectivity_row(row, above, below, eight, dst);
        });
}

/// Per-row mask kernel.
#[multiversion(targets(
    "x86_64+avx2+bmi1+bmi2+popcnt+lzcnt",
    "x86_64+avx512f+avx512bw+avx512dq+avx512vl",
    "aarch64+neon"
))]
fn connectivity_row<P: Pixel>(
    row: &[P],
    above: Option<&[P]>,
    below: Option<&[P]>,
    eight: bool,
    dst: &mut [u8],
) {
    let w = row.len();
    for x in 0..w {
        let v = row[x];
        let mut mask = 0u8;
        if x > 0 && row[x - 1] == v {
            mask |= CONN_W;
        }
        if x + 1 < w && row[x + 1] == v {
            mask |= CONN_E;
        }
        if let Some(above) = above {
            if above[x] == v {
                mask |= CONN_N;
            }
            if eight {
                if x > 0 && above[x - 1] == v {
                    mask |= CONN_NW;
                }
                if x + 1 < w && above[x + 1] == v {
                    mask |= CONN_NE;
                }
            }
        }
        if let Some(below) = below {
            if below[x] == v {
                mask |= CONN_S;
            }
            if eight {
                if x > 0 && below[x - 1] == v {
                    mask |= CONN_SW;
                }
                if x + 1 < w && below[x + 1] == v {
                    mask |= CONN_SE;
                }
            }
        }
        dst[x] = mask;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    fn build(data: &[u8], w: usize, h: usize, connectivity: Connectivity) -> Vec<u8> {
        let img = GridView::new(data, w, h, w).unwrap();
        let mut out = vec![0u8; w * h];
        build_connectivity_map(&img, connectivity, &mut out);
        out
    }

    #[test]
    fn test_row_pair_connectivity() {
        // [A, A, B, B, A]
        let masks = build(&[7, 7, 2, 2, 7], 5, 1, Connectivity::Four);
        assert_eq!(masks[0], CONN_E);
        assert_eq!(masks[1], CONN_W);
        assert_eq!(masks[2], CONN_E);
        assert_eq!(masks[3], CONN_W);
        assert_eq!(masks[4], 0);
    }

    #[test]
    fn test_four_never_sets_diagonal_bits() {
        let masks = build(&[1, 1, 1, 1], 2, 2, Connectivity::Four);
        for mask in masks {
            assert_eq!(mask & (CONN_NW | CONN_NE | CONN_SW | CONN_SE), 0);
        }
    }

    #[test]
    fn test_eight_diagonal() {
        // 1 0
        // 0 1
        let masks = build(&[1, 0, 0, 1], 2, 2, Connectivity::Eight);
        assert_eq!(masks[0] & CONN_SE, CONN_SE);
        assert_eq!(masks[3] & CONN_NW, CONN_NW);
        assert_eq!(masks[0] & (CONN_E | CONN_S), 0);
    }

    proptest! {
        /// A set bit in one direction implies the mirror bit on the neighbor.
        #[test]
        fn prop_connectivity_is_symmetric(
            w in 1..12usize,
            h in 1..12usize,
            data in prop::collection::vec(0..4u8, 144),
            eight in proptest::bool::ANY,
        ) {
            let connectivity = if eight { Connectivity::Eight } else { Connectivity::Four };
            let masks = build(&data[..w * h], w, h, connectivity);
            for y in 0..h {
                for x in 0..w {
                    let mask = masks[y * w + x];
                    for (bit, dx, dy) in DIRECTIONS {
                        if mask & bit == 0 {
                            continue;
                        }
                        let nx = (x as isize + dx) as usize;
                        let ny = (y as isize + dy) as usize;
                        prop_assert!(nx < w && ny < h, "set bit points out of bounds");
                        let (mirror, _, _) = DIRECTIONS
                            .iter()
                            .find(|(_, mdx, mdy)| *mdx == -dx && *mdy == -dy)
                            .copied()
                            .unwrap();
                        prop_assert_ne!(masks[ny * w + nx] & mirror, 0);
                    }
                }
            }
        }
    }
}

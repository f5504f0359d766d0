//! Per-tile provisional labeling.
//!
//! Each tile is labeled fully independently: a local union-find over the
//! connectivity map restricted to intra-tile edges. Cross-tile edges are left
//! to the merger. Tiles write disjoint regions of the forest, so the pass
//! needs no synchronization beyond the joining barrier.

use rayon::prelude::*;

use crate::connectivity::{CONN_N, CONN_NE, CONN_NW, CONN_W};
use crate::forest::LabelForest;
use crate::label::Label;

/// Tile grid geometry derived from the image shape and tile dimensions.
/// Edge tiles are clamped to the image bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    /// Tile width in pixels.
    pub tile_cols: usize,
    /// Tile height in pixels.
    pub tile_rows: usize,
    /// Tile count along x.
    pub n_horz: usize,
    /// Tile count along y.
    pub n_vert: usize,
}

impl TileGrid {
    #[must_use]
    pub fn new(width: usize, height: usize, tile_cols: usize, tile_rows: usize) -> Self {
        Self {
            tile_cols,
            tile_rows,
            n_horz: width.div_ceil(tile_cols),
            n_vert: height.div_ceil(tile_rows),
        }
    }

    /// Pixel bounds `(x0, x1, y0, y1)` of tile `(tx, ty)`, exclusive ends,
    /// clamped to the image.
    #[must_use]
    pub fn bounds(
        &self,
        tx: usize,
        ty: usize,
        width: usize,
        height: usize,
    ) -> (usize, usize, usize, usize) {
        let x0 = tx * self.tile_cols;
        let y0 = ty * self.tile_rows;
        (
            x0,
            (x0 + self.tile_cols).min(width),
            y0,
            (y0 + self.tile_rows).min(height),
        )
    }
}

/// Label every tile independently.
///
/// Contract: afterwards each tile's pixels form an internally consistent
/// forest whose roots are the minimum linear index of each intra-tile
/// component. The forest must enter this pass as singleton roots.
pub fn label_tiles<L: Label>(
    forest: &LabelForest<'_, L>,
    conn: &[u8],
    width: usize,
    height: usize,
    grid: &TileGrid,
) {
    let n_tiles = grid.n_horz * grid.n_vert;
    (0..n_tiles).into_par_iter().for_each(|t| {
        let tx = t % grid.n_horz;
        let ty = t / grid.n_horz;
        let (x0, x1, y0, y1) = grid.bounds(tx, ty, width, height);
        for y in y0..y1 {
            let base = y * width;
            for x in x0..x1 {
                let i = base + x;
                let mask = conn[i];
                // Only edges toward already-scanned intra-tile neighbors:
                // west and the three northern directions.
                if mask & CONN_W != 0 && x > x0 {
                    forest.union(i, i - 1);
                }
                if y > y0 {
                    if mask & CONN_N != 0 {
                        forest.union(i, i - width);
                    }
                    if mask & CONN_NW != 0 && x > x0 {
                        forest.union(i, i - width - 1);
                    }
                    if mask & CONN_NE != 0 && x + 1 < x1 {
                        forest.union(i, i - width + 1);
                    }
                }
            }
        }
    });
}

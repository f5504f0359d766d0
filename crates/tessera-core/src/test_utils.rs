//! Utilities for testing: synthetic grids and a reference labeler.

use crate::config::Connectivity;
use crate::label::Pixel;

/// Naive sequential flood-fill labeler used as ground truth.
///
/// Assigns dense IDs `1..=K` in scanline order of each component's first
/// pixel — the same canonical ordering the pipeline produces — so label
/// fields can be compared for equality, not just partition structure.
#[must_use]
pub fn reference_labels<P: Pixel>(
    data: &[P],
    width: usize,
    height: usize,
    connectivity: Connectivity,
    background: Option<P>,
) -> (Vec<u64>, usize) {
    let offsets: &[(isize, isize)] = match connectivity {
        Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
        Connectivity::Eight => &[
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
        ],
    };

    let mut labels = vec![0u64; width * height];
    let mut count = 0u64;
    let mut stack = Vec::new();
    for start in 0..width * height {
        if labels[start] != 0 || background.is_some_and(|b| data[start] == b) {
            continue;
        }
        count += 1;
        labels[start] = count;
        stack.push(start);
        while let Some(i) = stack.pop() {
            let x = i % width;
            let y = i / width;
            for &(dx, dy) in offsets {
                let nx = x.wrapping_add_signed(dx);
                let ny = y.wrapping_add_signed(dy);
                if nx >= width || ny >= height {
                    continue;
                }
                let n = ny * width + nx;
                if labels[n] == 0 && data[n] == data[i] {
                    labels[n] = count;
                    stack.push(n);
                }
            }
        }
    }
    (labels, count as usize)
}

/// A single 8-connected chain from the top-left to the bottom-right corner:
/// diagonal until it hits an edge, then straight along it. Crosses every
/// tile boundary on both axes for any tile size.
#[must_use]
pub fn diagonal_chain(width: usize, height: usize) -> Vec<u8> {
    let mut data = vec![0u8; width * height];
    for step in 0..width.max(height) {
        let x = step.min(width - 1);
        let y = step.min(height - 1);
        data[y * width + x] = 1;
    }
    data
}

/// Checkerboard of `cell`-sized squares alternating between two values.
#[must_use]
pub fn checkerboard(width: usize, height: usize, cell: usize) -> Vec<u8> {
    let mut data = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            data[y * width + x] = (((x / cell) + (y / cell)) % 2) as u8;
        }
    }
    data
}

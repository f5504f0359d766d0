#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use tessera_core::test_utils::{diagonal_chain, reference_labels};
use tessera_core::{Connectivity, GridView, LabelingPipeline, PipelineConfig};

/// Build a pipeline with an explicit tile shape (one pixel per worker).
fn pipeline_with_tiles(
    width: usize,
    height: usize,
    tile_cols: usize,
    tile_rows: usize,
    connectivity: Connectivity,
    background: Option<u8>,
) -> LabelingPipeline<u8, u32> {
    let mut builder = PipelineConfig::builder()
        .workgroup_tile_x(tile_cols)
        .workgroup_tile_y(tile_rows)
        .workitem_repeat_x(1)
        .workitem_repeat_y(1)
        .local_workers((tile_cols * tile_rows).max(8))
        .worker_groups(4)
        .connectivity(connectivity);
    if let Some(b) = background {
        builder = builder.background(b);
    }
    LabelingPipeline::new(width, height, builder.build()).unwrap()
}

fn label_u32(
    data: &[u8],
    width: usize,
    height: usize,
    tile_cols: usize,
    tile_rows: usize,
    connectivity: Connectivity,
    background: Option<u8>,
) -> (Vec<u32>, usize) {
    let img = GridView::new(data, width, height, width).unwrap();
    let mut pipeline =
        pipeline_with_tiles(width, height, tile_cols, tile_rows, connectivity, background);
    let result = pipeline.label(&img).unwrap();
    (result.labels, result.count)
}

#[test]
fn test_single_row_three_components() {
    // [A, A, B, B, A] under 4-connectivity: {0,1}, {2,3}, {4}.
    let data = [10u8, 10, 20, 20, 10];
    let (labels, count) = label_u32(&data, 5, 1, 2, 1, Connectivity::Four, None);
    assert_eq!(count, 3);
    assert_eq!(labels, vec![1, 1, 2, 2, 3]);
}

#[test]
fn test_uniform_image_single_component() {
    for (w, h) in [(1, 1), (5, 3), (64, 64), (129, 67)] {
        let data = vec![42u8; w * h];
        let (labels, count) = label_u32(&data, w, h, 8, 8, Connectivity::Four, None);
        assert_eq!(count, 1, "{}x{} uniform image", w, h);
        assert!(labels.iter().all(|&l| l == 1));
    }
}

#[test]
fn test_all_background_image() {
    let data = vec![0u8; 48 * 33];
    let (labels, count) = label_u32(&data, 48, 33, 8, 8, Connectivity::Four, Some(0));
    assert_eq!(count, 0);
    assert!(labels.iter().all(|&l| l == 0));
}

#[test]
fn test_labels_are_dense() {
    // Stripes of alternating values: every other column its own component.
    let w = 31;
    let h = 17;
    let mut data = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            data[y * w + x] = (x % 2) as u8;
        }
    }
    let (labels, count) = label_u32(&data, w, h, 4, 4, Connectivity::Four, Some(0));
    // 15 foreground columns.
    assert_eq!(count, 15);
    let mut seen = vec![false; count + 1];
    for &l in &labels {
        seen[l as usize] = true;
    }
    assert!(seen.iter().skip(1).all(|&s| s), "label IDs must have no gaps");
}

#[test]
fn test_diagonal_chain_survives_any_tile_size() {
    let w = 130;
    let h = 70;
    let data = diagonal_chain(w, h);
    for (tc, tr) in [(2, 2), (3, 5), (8, 8), (16, 4), (64, 16)] {
        let (labels, count) = label_u32(&data, w, h, tc, tr, Connectivity::Eight, Some(0));
        assert_eq!(count, 1, "tile {}x{}", tc, tr);
        // Every chain pixel carries the single label.
        for (i, &v) in data.iter().enumerate() {
            assert_eq!(labels[i], u32::from(v != 0), "pixel {} with tile {}x{}", i, tc, tr);
        }
    }
}

#[test]
fn test_deterministic_across_runs() {
    let w = 97;
    let h = 53;
    let mut data = vec![0u8; w * h];
    // Pseudo-random but fixed content.
    let mut state = 0x2545_f491u32;
    for v in &mut data {
        state = state.wrapping_mul(48271) % 0x7fff_ffff;
        *v = (state % 3) as u8;
    }

    let img = GridView::new(&data, w, h, w).unwrap();
    let mut pipeline = pipeline_with_tiles(w, h, 8, 8, Connectivity::Four, Some(0));
    let first = pipeline.label(&img).unwrap();
    for _ in 0..5 {
        let again = pipeline.label(&img).unwrap();
        assert_eq!(again.labels, first.labels);
        assert_eq!(again.count, first.count);
    }
}

#[test]
fn test_tile_size_invariance() {
    let w = 61;
    let h = 47;
    let mut data = vec![0u8; w * h];
    let mut state = 7u32;
    for v in &mut data {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        *v = ((state >> 16) % 2) as u8;
    }

    let baseline = label_u32(&data, w, h, 2, 2, Connectivity::Four, Some(0));
    for (tc, tr) in [(3, 3), (5, 7), (16, 16), (64, 16)] {
        let other = label_u32(&data, w, h, tc, tr, Connectivity::Four, Some(0));
        assert_eq!(other, baseline, "tile {}x{}", tc, tr);
    }
}

#[test]
fn test_matches_reference_labeler() {
    let w = 40;
    let h = 25;
    let data = tessera_core::test_utils::checkerboard(w, h, 3);
    for connectivity in [Connectivity::Four, Connectivity::Eight] {
        let (labels, count) = label_u32(&data, w, h, 8, 4, connectivity, None);
        let (expected, expected_count) = reference_labels(&data, w, h, connectivity, None);
        assert_eq!(count, expected_count);
        let widened: Vec<u64> = labels.iter().map(|&l| u64::from(l)).collect();
        assert_eq!(widened, expected);
    }
}

#[test]
fn test_fused_and_unfused_marking_agree() {
    let w = 33;
    let h = 29;
    let data = tessera_core::test_utils::checkerboard(w, h, 2);
    let img = GridView::new(&data, w, h, w).unwrap();

    let results: Vec<(Vec<u32>, usize)> = [true, false]
        .into_iter()
        .map(|fused| {
            let config = PipelineConfig::builder()
                .background(0u8)
                .fused_mark(fused)
                .build();
            let mut pipeline = LabelingPipeline::<u8, u32>::new(w, h, config).unwrap();
            let result = pipeline.label(&img).unwrap();
            (result.labels, result.count)
        })
        .collect();
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_strided_input_ignores_padding() {
    // 5x2 image stored with stride 7; padding bytes carry foreground values
    // that must not leak into the labeling.
    let data = vec![
        1u8, 1, 0, 2, 2, 9, 9, //
        1, 0, 0, 2, 2, 9, 9,
    ];
    let img = GridView::new(&data, 5, 2, 7).unwrap();
    let config = PipelineConfig::builder().background(0u8).build();
    let mut pipeline = LabelingPipeline::<u8, u32>::new(5, 2, config).unwrap();
    let result = pipeline.label(&img).unwrap();
    assert_eq!(result.count, 2);
    assert_eq!(result.labels, vec![1, 1, 0, 2, 2, 1, 0, 0, 2, 2]);
}

#[test]
fn test_tall_narrow_image() {
    // One pixel wide: components split only by value changes along y.
    let h = 100;
    let mut data = vec![1u8; h];
    data[40] = 2;
    let (labels, count) = label_u32(&data, 1, h, 4, 4, Connectivity::Four, None);
    assert_eq!(count, 3);
    assert_eq!(labels[0], 1);
    assert_eq!(labels[40], 2);
    assert_eq!(labels[99], 3);
}

#[test]
fn test_wide_label_type() {
    let data = [10u8, 10, 20, 20, 10];
    let img = GridView::new(&data, 5, 1, 5).unwrap();
    let config = PipelineConfig::builder().build();
    let mut pipeline = LabelingPipeline::<u8, u64>::new(5, 1, config).unwrap();
    let result = pipeline.label(&img).unwrap();
    assert_eq!(result.count, 3);
    assert_eq!(result.labels, vec![1u64, 1, 2, 2, 3]);
}

#[test]
fn test_merge_stats_collected_when_enabled() {
    let w = 64;
    let h = 64;
    let data = vec![1u8; w * h];
    let img = GridView::new(&data, w, h, w).unwrap();

    let config = PipelineConfig::builder()
        .workgroup_tile_x(8)
        .workgroup_tile_y(8)
        .workitem_repeat_x(1)
        .workitem_repeat_y(1)
        .local_workers(64)
        .merge_stats(true)
        .build();
    let mut pipeline = LabelingPipeline::<u8, u32>::new(w, h, config).unwrap();
    let result = pipeline.label(&img).unwrap();
    assert_eq!(result.stats.merge_iterations, 3);
    assert_eq!(result.stats.merge_retries.len(), 3);
    assert_eq!(result.count, 1);
}

proptest! {
    /// Two pixels share a final label iff they are chain-connected under the
    /// adjacency rule — checked against the naive flood-fill reference,
    /// which also fixes the canonical scanline ID ordering.
    #[test]
    fn prop_matches_reference(
        w in 1..48usize,
        h in 1..32usize,
        tile_cols in 1..20usize,
        tile_rows in 1..20usize,
        eight in proptest::bool::ANY,
        with_background in proptest::bool::ANY,
        data in prop::collection::vec(0..3u8, 48 * 32),
    ) {
        let connectivity = if eight { Connectivity::Eight } else { Connectivity::Four };
        let background = with_background.then_some(0u8);
        let slice = &data[..w * h];

        let (labels, count) =
            label_u32(slice, w, h, tile_cols, tile_rows, connectivity, background);
        let (expected, expected_count) =
            reference_labels(slice, w, h, connectivity, background);

        prop_assert_eq!(count, expected_count);
        let widened: Vec<u64> = labels.iter().map(|&l| u64::from(l)).collect();
        prop_assert_eq!(widened, expected);
    }
}

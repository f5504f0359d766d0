//! Stride-aware grid view for zero-copy ingestion.

use crate::label::Pixel;

/// Error returned when a [`GridView`] cannot be constructed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The row stride is smaller than the row width.
    #[error("stride ({stride}) cannot be less than width ({width})")]
    StrideTooSmall { width: usize, stride: usize },
    /// The backing buffer is too small for the requested dimensions.
    #[error(
        "buffer size ({len}) is too small for {width}x{height} grid with stride {stride} (required: {required})"
    )]
    BufferTooSmall {
        len: usize,
        width: usize,
        height: usize,
        stride: usize,
        required: usize,
    },
}

/// A borrowed view into a 2D pixel grid with explicit stride support.
///
/// Allows ingesting host buffers with row padding or non-standard layouts
/// without copying. The pipeline never mutates the viewed data.
#[derive(Clone, Copy)]
pub struct GridView<'a, P: Pixel> {
    pub data: &'a [P],
    pub width: usize,
    pub height: usize,
    pub stride: usize,
}

impl<'a, P: Pixel> GridView<'a, P> {
    /// Create a new view after validating that the buffer size matches the
    /// dimensions and stride.
    pub fn new(
        data: &'a [P],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Self, GridError> {
        if stride < width {
            return Err(GridError::StrideTooSmall { width, stride });
        }
        let required = if height > 0 {
            (height - 1) * stride + width
        } else {
            0
        };
        if data.len() < required {
            return Err(GridError::BufferTooSmall {
                len: data.len(),
                width,
                height,
                stride,
                required,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Safe accessor for a specific row, excluding any stride padding.
    #[inline(always)]
    pub fn row(&self, y: usize) -> &[P] {
        assert!(y < self.height, "row index {} out of bounds", y);
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Safe accessor for a specific pixel.
    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> P {
        assert!(x < self.width, "column index {} out of bounds", x);
        self.row(y)[x]
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_grid_view_stride() {
        let data = vec![
            1u8, 2, 3, 0, // row 0 + padding
            4, 5, 6, 0, // row 1 + padding
        ];
        let view = GridView::new(&data, 3, 2, 4).unwrap();
        assert_eq!(view.row(0), &[1, 2, 3]);
        assert_eq!(view.row(1), &[4, 5, 6]);
        assert_eq!(view.get(1, 1), 5);
    }

    #[test]
    fn test_stride_below_width_rejected() {
        let data = vec![0u8; 16];
        let err = GridView::new(&data, 4, 2, 3).err();
        assert_eq!(
            err,
            Some(GridError::StrideTooSmall {
                width: 4,
                stride: 3
            })
        );
    }

    #[test]
    fn test_invalid_buffer_size() {
        let data = vec![1u8, 2, 3];
        let result = GridView::new(&data, 2, 2, 2);
        assert!(result.is_err());
    }
}

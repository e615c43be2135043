//! Reshaping of pixel strings into image rasters
//!
//! Each record's pixel string flattens to one row of the feature matrix; the
//! square raster view of the same data is used for display and
//! reconstruction checks. Both representations share one backing matrix, so
//! flattening and reshaping are pure views with no data loss.

use ndarray::{Array2, Array3, ArrayView2};

use crate::error::{Error, Result};

/// Images are square rasters of this side length.
pub const IMAGE_SIDE: usize = 48;

/// Flattened width of one image.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

/// A stack of same-sized square grayscale images.
///
/// Stored flattened, one image per row, the layout every numeric component
/// downstream expects.
#[derive(Debug, Clone)]
pub struct ImageStack {
    flat: Array2<f64>,
    side: usize,
}

impl ImageStack {
    /// Parse whitespace-separated pixel strings into a stack of
    /// `side`×`side` images.
    ///
    /// Fails with [`Error::PixelCount`] if any row does not contain exactly
    /// `side * side` values, and [`Error::DataFormat`] if a value is not an
    /// integer.
    pub fn from_pixel_rows(rows: &[String], side: usize) -> Result<ImageStack> {
        let width = side * side;
        let mut data = Vec::with_capacity(rows.len() * width);

        for (row, pixels) in rows.iter().enumerate() {
            let before = data.len();
            for token in pixels.split_whitespace() {
                let value: i64 = token.parse().map_err(|_| {
                    Error::DataFormat(format!("row {}: bad pixel value {:?}", row, token))
                })?;
                data.push(value as f64);
            }
            let found = data.len() - before;
            if found != width {
                return Err(Error::PixelCount {
                    row,
                    expected: width,
                    found,
                });
            }
        }

        let flat = Array2::from_shape_vec((rows.len(), width), data)?;
        Ok(ImageStack { flat, side })
    }

    /// Wrap an already-flattened matrix, checking that its width matches the
    /// image dimensions.
    pub fn from_matrix(flat: Array2<f64>, side: usize) -> Result<ImageStack> {
        if flat.ncols() != side * side {
            return Err(Error::PixelCount {
                row: 0,
                expected: side * side,
                found: flat.ncols(),
            });
        }
        Ok(ImageStack { flat, side })
    }

    pub fn len(&self) -> usize {
        self.flat.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.nrows() == 0
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// The flattened feature matrix, shape `[count, side * side]`.
    pub fn matrix(&self) -> &Array2<f64> {
        &self.flat
    }

    pub fn into_matrix(self) -> Array2<f64> {
        self.flat
    }

    /// Square raster view of image `i`.
    pub fn raster(&self, i: usize) -> ArrayView2<f64> {
        // rows of a standard-layout matrix are contiguous, reshape cannot fail
        self.flat.row(i).into_shape((self.side, self.side)).unwrap()
    }

    /// The raster stack, shape `[count, side, side]`.
    pub fn rasters(&self) -> Array3<f64> {
        let (n, side) = (self.len(), self.side);
        self.flat.clone().into_shape((n, side, side)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn rows(strings: &[&str]) -> Vec<String> {
        strings.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reshape_round_trip_is_exact() {
        let stack = ImageStack::from_pixel_rows(&rows(&["0 1 2 3", "4 5 6 7"]), 2).unwrap();

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.matrix().dim(), (2, 4));
        assert_eq!(stack.raster(0), array![[0., 1.], [2., 3.]]);
        assert_eq!(stack.raster(1), array![[4., 5.], [6., 7.]]);

        // flatten(raster(i)) recovers row i exactly
        let rasters = stack.rasters();
        let back = rasters.into_shape((2, 4)).unwrap();
        assert_eq!(back, *stack.matrix());
    }

    #[test]
    fn short_pixel_row_is_a_shape_error() {
        let err = ImageStack::from_pixel_rows(&rows(&["0 1 2 3", "4 5 6"]), 2).unwrap_err();
        match err {
            crate::error::Error::PixelCount {
                row,
                expected,
                found,
            } => {
                assert_eq!(row, 1);
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn non_integer_pixel_is_a_format_error() {
        let err = ImageStack::from_pixel_rows(&rows(&["0 x 2 3"]), 2).unwrap_err();
        assert!(matches!(err, crate::error::Error::DataFormat(_)));
    }

    #[test]
    fn matrix_width_is_checked() {
        let m = Array2::zeros((3, 5));
        assert!(ImageStack::from_matrix(m, 2).is_err());
    }
}

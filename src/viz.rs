//! Grayscale grid renderings of image stacks
//!
//! Lays the first `rows * cols` images of a stack out on a single PNG, with
//! a one-pixel gutter between tiles. Each tile is normalized to the full
//! 8-bit range on its own, so reconstructions and centroids stay visible
//! even when their value range drifts far from the original 0..=255 pixels.

use std::path::Path;

use image::GrayImage;

use crate::dataset::ImageStack;
use crate::error::Result;

const GUTTER: u32 = 1;

/// Render up to `rows * cols` images from `stack` into a PNG grid at `path`.
pub fn save_grid(stack: &ImageStack, rows: usize, cols: usize, path: &Path) -> Result<()> {
    let side = stack.side() as u32;
    let count = stack.len().min(rows * cols);

    let width = cols as u32 * (side + GUTTER) + GUTTER;
    let height = rows as u32 * (side + GUTTER) + GUTTER;
    let mut canvas = GrayImage::new(width, height);

    for i in 0..count {
        let raster = stack.raster(i);

        // per-tile contrast stretch
        let min = raster.fold(f64::INFINITY, |a, &b| a.min(b));
        let max = raster.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let span = if max > min { max - min } else { 1. };

        let x0 = (i % cols) as u32 * (side + GUTTER) + GUTTER;
        let y0 = (i / cols) as u32 * (side + GUTTER) + GUTTER;
        for ((y, x), &value) in raster.indexed_iter() {
            let level = ((value - min) / span * 255.).round() as u8;
            canvas.put_pixel(x0 + x as u32, y0 + y as u32, image::Luma([level]));
        }
    }

    canvas.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_stack(count: usize, side: usize) -> ImageStack {
        let width = side * side;
        let flat = ndarray::Array2::from_shape_fn((count, width), |(i, j)| (i * width + j) as f64);
        ImageStack::from_matrix(flat, side).unwrap()
    }

    #[test]
    fn grid_file_is_written() {
        let dir = std::env::temp_dir().join("facexp-viz-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("grid.png");

        save_grid(&gradient_stack(4, 4), 2, 2, &path).unwrap();
        assert!(path.exists());

        let img = image::open(&path).unwrap().to_luma8();
        assert_eq!(img.width(), 2 * (4 + 1) + 1);
        assert_eq!(img.height(), 2 * (4 + 1) + 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn short_stack_fills_only_available_tiles() {
        let dir = std::env::temp_dir().join("facexp-viz-short");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("short.png");

        // 3 images on an 8-tile grid must not panic
        save_grid(&gradient_stack(3, 2), 2, 4, &path).unwrap();
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }
}

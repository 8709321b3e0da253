//! Square RGB patches cut from (height, width, channel) image arrays

use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2, Array3, ArrayViewMut1, Axis};
use rand::Rng;

/// Added to the per-patch variance (0-255 pixel scale) before dividing
pub const NORMALIZE_VARIANCE_OFFSET: f64 = 10.0;

/// Length of a flattened `rf_size` × `rf_size` × 3 patch
pub fn patch_dim(rf_size: usize) -> usize {
    rf_size * rf_size * 3
}

fn check_fits(image: &Array3<f64>, rf_size: usize) -> Result<()> {
    let (h, w, _) = image.dim();
    if rf_size == 0 {
        return Err(GalaxyError::InvalidParameter {
            name: "rf_size".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if h < rf_size || w < rf_size {
        return Err(GalaxyError::insufficient("image pixels per side", rf_size, h.min(w)));
    }
    Ok(())
}

fn copy_patch(image: &Array3<f64>, top: usize, left: usize, rf_size: usize, mut out: ArrayViewMut1<f64>) {
    let mut k = 0;
    for r in top..top + rf_size {
        for c in left..left + rf_size {
            for ch in 0..3 {
                out[k] = image[[r, c, ch]];
                k += 1;
            }
        }
    }
}

/// One patch at a uniformly random position
pub fn random_patch<R: Rng>(image: &Array3<f64>, rf_size: usize, rng: &mut R) -> Result<Array1<f64>> {
    check_fits(image, rf_size)?;
    let (h, w, _) = image.dim();
    let top = rng.gen_range(0..=h - rf_size);
    let left = rng.gen_range(0..=w - rf_size);

    let mut patch = Array1::zeros(patch_dim(rf_size));
    copy_patch(image, top, left, rf_size, patch.view_mut());
    Ok(patch)
}

/// Patches on a regular grid
///
/// Returns the patch rows (grid row-major) together with the grid shape.
pub fn dense_patches(image: &Array3<f64>, rf_size: usize, stride: usize) -> Result<(Array2<f64>, (usize, usize))> {
    check_fits(image, rf_size)?;
    if stride == 0 {
        return Err(GalaxyError::InvalidParameter {
            name: "stride".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    let (h, w, _) = image.dim();
    let grid_rows = (h - rf_size) / stride + 1;
    let grid_cols = (w - rf_size) / stride + 1;

    let mut patches = Array2::zeros((grid_rows * grid_cols, patch_dim(rf_size)));
    for (i, row) in patches.axis_iter_mut(Axis(0)).enumerate() {
        let top = (i / grid_cols) * stride;
        let left = (i % grid_cols) * stride;
        copy_patch(image, top, left, rf_size, row);
    }
    Ok((patches, (grid_rows, grid_cols)))
}

/// Per-patch brightness and contrast normalization, in place
///
/// Pixels are taken on the 0-255 scale: each row has its mean removed and is
/// divided by `sqrt(var + 10)`.
pub fn normalize_patches(patches: &mut Array2<f64>) {
    for mut row in patches.axis_iter_mut(Axis(0)) {
        let n = row.len();
        if n == 0 {
            continue;
        }
        row.mapv_inplace(|v| v * 255.0);
        let mean = row.sum() / n as f64;
        let var = if n > 1 {
            row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let denom = (var + NORMALIZE_VARIANCE_OFFSET).sqrt();
        row.mapv_inplace(|v| (v - mean) / denom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ramp(h: usize, w: usize) -> Array3<f64> {
        Array3::from_shape_fn((h, w, 3), |(r, c, ch)| (r * 100 + c * 10 + ch) as f64 / 1000.0)
    }

    #[test]
    fn test_dense_patch_grid() {
        let image = ramp(5, 4);
        let (patches, grid) = dense_patches(&image, 2, 1).unwrap();
        assert_eq!(grid, (4, 3));
        assert_eq!(patches.dim(), (12, 12));

        // second patch starts at (0, 1)
        assert_eq!(patches[[1, 0]], image[[0, 1, 0]]);
        // last patch bottom-right pixel, blue channel
        assert_eq!(patches[[11, 11]], image[[4, 3, 2]]);
    }

    #[test]
    fn test_dense_patch_stride() {
        let image = ramp(6, 6);
        let (patches, grid) = dense_patches(&image, 2, 2).unwrap();
        assert_eq!(grid, (3, 3));
        assert_eq!(patches.nrows(), 9);
    }

    #[test]
    fn test_image_smaller_than_patch() {
        let image = ramp(3, 8);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = random_patch(&image, 4, &mut rng).unwrap_err();
        assert!(matches!(err, GalaxyError::InsufficientSample { requested: 4, available: 3, .. }));
    }

    #[test]
    fn test_random_patch_within_bounds() {
        let image = ramp(8, 8);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..20 {
            let patch = random_patch(&image, 3, &mut rng).unwrap();
            assert_eq!(patch.len(), 27);
            assert!(patch.iter().all(|&v| v >= 0.0 && v <= 1.0));
        }
    }

    #[test]
    fn test_normalize_zero_mean() {
        let mut patches = Array2::from_shape_fn((3, 12), |(i, j)| ((i + 1) * j) as f64 / 50.0);
        normalize_patches(&mut patches);
        for row in patches.rows() {
            assert!(row.sum().abs() < 1e-9);
        }

        let mut flat = Array2::from_elem((1, 12), 0.5);
        normalize_patches(&mut flat);
        assert!(flat.iter().all(|&v| v == 0.0));
    }
}

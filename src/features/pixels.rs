//! Raw pixel features

use crate::data::ImageStore;
use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::info;

fn stack(rows: Vec<Array1<f64>>, what: &str) -> Result<Array2<f64>> {
    let width = rows.first().map_or(0, |r| r.len());
    let mut out = Array2::zeros((rows.len(), width));
    for (i, (mut dst, src)) in out.axis_iter_mut(Axis(0)).zip(rows.iter()).enumerate() {
        if src.len() != width {
            return Err(GalaxyError::shape(
                format!("{} {} values", width, what),
                format!("{} values in row {}", src.len(), i),
            ));
        }
        dst.assign(src);
    }
    Ok(out)
}

/// Crop, rescale and flatten every image into one row
pub fn pixel_features(store: &dyn ImageStore, ids: &[u64], crop_size: u32, scale: f64) -> Result<Array2<f64>> {
    info!(images = ids.len(), crop_size, scale, "Extracting pixel features");
    let rows = ids
        .par_iter()
        .map(|&id| {
            let mut image = store.load(id)?;
            image.crop(crop_size)?.rescale(scale)?;
            Ok(image.flatten())
        })
        .collect::<Result<Vec<_>>>()?;
    stack(rows, "pixel")
}

/// RGB color at the center of every image, `(n, 3)`
pub fn central_pixels(store: &dyn ImageStore, ids: &[u64]) -> Result<Array2<f64>> {
    let rows = ids
        .par_iter()
        .map(|&id| Ok(Array1::from(store.load(id)?.central_pixel().to_vec())))
        .collect::<Result<Vec<_>>>()?;
    stack(rows, "color")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryImageStore;
    use image::{Rgb, RgbImage};

    fn store() -> MemoryImageStore {
        let mut store = MemoryImageStore::new();
        store.insert(1, RgbImage::from_pixel(20, 20, Rgb([255, 0, 0])));
        store.insert(2, RgbImage::from_pixel(24, 20, Rgb([0, 0, 255])));
        store
    }

    #[test]
    fn test_pixel_features_shape() {
        let images = store();
        let x = pixel_features(&images, &[1, 2], 10, 0.5).unwrap();
        assert_eq!(x.dim(), (2, 5 * 5 * 3));
        assert!((x[[0, 0]] - 1.0).abs() < 0.01);
        assert!((x[[1, 2]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_crop_larger_than_image() {
        let images = store();
        assert!(pixel_features(&images, &[1], 30, 1.0).is_err());
    }

    #[test]
    fn test_central_pixels() {
        let images = store();
        let colors = central_pixels(&images, &[2, 1]).unwrap();
        assert_eq!(colors.dim(), (2, 3));
        assert_eq!(colors.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(colors.row(1).to_vec(), vec![1.0, 0.0, 0.0]);
    }
}

//! Galaxy image loading and the crop/rescale/flatten transforms

use crate::error::{GalaxyError, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array1, Array3};
use std::path::Path;

/// An RGB galaxy image with pixel values scaled to `[0, 1]` on export
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: RgbImage,
}

impl RawImage {
    /// Decode an image file
    pub fn open(path: &Path) -> Result<Self> {
        let decoded = image::open(path).map_err(|e| {
            GalaxyError::DataLoad(format!("{}: {}", path.display(), e))
        })?;
        Ok(Self { pixels: decoded.to_rgb8() })
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// (height, width)
    pub fn dims(&self) -> (usize, usize) {
        (self.pixels.height() as usize, self.pixels.width() as usize)
    }

    /// Keep a centered `size` × `size` square
    pub fn crop(&mut self, size: u32) -> Result<&mut Self> {
        let (w, h) = self.pixels.dimensions();
        if size == 0 || size > w || size > h {
            return Err(GalaxyError::InvalidParameter {
                name: "crop_size".to_string(),
                value: size.to_string(),
                reason: format!("image is {}x{}", w, h),
            });
        }
        let x = (w - size) / 2;
        let y = (h - size) / 2;
        self.pixels = imageops::crop_imm(&self.pixels, x, y, size, size).to_image();
        Ok(self)
    }

    /// Resize by a factor, keeping at least one pixel per side
    pub fn rescale(&mut self, scale: f64) -> Result<&mut Self> {
        if !(scale > 0.0) {
            return Err(GalaxyError::InvalidParameter {
                name: "scale".to_string(),
                value: scale.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let (w, h) = self.pixels.dimensions();
        let new_w = ((w as f64 * scale).round() as u32).max(1);
        let new_h = ((h as f64 * scale).round() as u32).max(1);
        if (new_w, new_h) != (w, h) {
            self.pixels = imageops::resize(&self.pixels, new_w, new_h, FilterType::Triangle);
        }
        Ok(self)
    }

    /// Color of the center pixel
    pub fn central_pixel(&self) -> [f64; 3] {
        let (w, h) = self.pixels.dimensions();
        let p = self.pixels.get_pixel(w / 2, h / 2);
        [p[0] as f64 / 255.0, p[1] as f64 / 255.0, p[2] as f64 / 255.0]
    }

    /// Pixels as a (height, width, channel) array
    pub fn to_array(&self) -> Array3<f64> {
        let (h, w) = self.dims();
        Array3::from_shape_fn((h, w, 3), |(r, c, ch)| {
            self.pixels.get_pixel(c as u32, r as u32)[ch] as f64 / 255.0
        })
    }

    /// Row-major, channel-interleaved feature vector
    pub fn flatten(&self) -> Array1<f64> {
        self.pixels.as_raw().iter().map(|&v| v as f64 / 255.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RawImage {
        RawImage::from_rgb(RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 200])))
    }

    #[test]
    fn test_crop_is_centered() {
        let mut img = gradient(10, 8);
        img.crop(4).unwrap();
        assert_eq!(img.dims(), (4, 4));
        let arr = img.to_array();
        assert!((arr[[0, 0, 0]] - 3.0 / 255.0).abs() < 1e-12);
        assert!((arr[[0, 0, 1]] - 2.0 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn test_crop_larger_than_image() {
        let mut img = gradient(4, 4);
        assert!(img.crop(5).is_err());
    }

    #[test]
    fn test_rescale_and_flatten() {
        let mut img = gradient(20, 20);
        img.rescale(0.5).unwrap();
        assert_eq!(img.dims(), (10, 10));
        assert_eq!(img.flatten().len(), 10 * 10 * 3);
    }

    #[test]
    fn test_central_pixel() {
        let img = gradient(9, 9);
        let [r, g, b] = img.central_pixel();
        assert!((r - 4.0 / 255.0).abs() < 1e-12);
        assert!((g - 4.0 / 255.0).abs() < 1e-12);
        assert!((b - 200.0 / 255.0).abs() < 1e-12);
    }
}

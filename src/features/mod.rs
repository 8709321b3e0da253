//! Feature extraction from galaxy images
//!
//! - Raw pixels (crop, rescale, flatten) and central-pixel colors
//! - K-means codebook features over normalized, whitened patches

mod kmeans;
pub mod patches;
mod pixels;
mod whitening;

pub use kmeans::{unique_rows, KMeansFeatures};
pub use pixels::{central_pixels, pixel_features};
pub use whitening::ZcaWhitening;

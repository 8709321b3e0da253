//! K-means patch features
//!
//! Single-layer unsupervised feature learning: random patches from the
//! training images are normalized, ZCA-whitened and clustered into a
//! codebook. Every image is then described by the triangle activations of
//! its densely sampled patches against that codebook, sum-pooled over a
//! grid of image regions.

use super::patches::{dense_patches, normalize_patches, patch_dim, random_patch};
use super::whitening::ZcaWhitening;
use crate::data::{ImageStore, RawImage};
use crate::error::{GalaxyError, Result};
use crate::training::KMeans;
use ndarray::{Array1, Array2, Array3, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

const WHITENING_EPSILON: f64 = 0.1;

/// Number of distinct rows of a matrix
pub fn unique_rows(data: &Array2<f64>) -> usize {
    data.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Codebook-based image features
#[derive(Debug, Clone)]
pub struct KMeansFeatures {
    rf_size: usize,
    num_centroids: usize,
    num_patches: usize,
    stride: usize,
    crop_size: Option<u32>,
    scale: f64,
    pooling: usize,
    whiten: bool,
    max_iter: usize,
    random_state: u64,
    whitening: Option<ZcaWhitening>,
    kmeans: Option<KMeans>,
}

impl KMeansFeatures {
    pub fn new(rf_size: usize, num_centroids: usize, num_patches: usize) -> Self {
        Self {
            rf_size,
            num_centroids,
            num_patches,
            stride: 1,
            crop_size: Some(150),
            scale: 0.2,
            pooling: 2,
            whiten: true,
            max_iter: 50,
            random_state: 42,
            whitening: None,
            kmeans: None,
        }
    }

    /// Step between densely extracted patches
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Centered crop (None keeps the full image) followed by a rescale
    pub fn with_crop(mut self, crop_size: Option<u32>, scale: f64) -> Self {
        self.crop_size = crop_size;
        self.scale = scale;
        self
    }

    /// Side of the pooling grid; features per image = centroids × pooling²
    pub fn with_pooling(mut self, pooling: usize) -> Self {
        self.pooling = pooling;
        self
    }

    pub fn with_whitening(mut self, whiten: bool) -> Self {
        self.whiten = whiten;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn feature_dim(&self) -> usize {
        self.num_centroids * self.pooling * self.pooling
    }

    /// The learned codebook, `num_centroids × rf_size²·3`
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.kmeans.as_ref().and_then(|k| k.centroids())
    }

    pub fn is_fitted(&self) -> bool {
        self.kmeans.is_some()
    }

    fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| GalaxyError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        for (name, value) in [
            ("rf_size", self.rf_size),
            ("num_centroids", self.num_centroids),
            ("stride", self.stride),
            ("pooling", self.pooling),
        ] {
            if value == 0 {
                return Err(invalid(name, "0".to_string(), "must be positive"));
            }
        }
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(invalid("scale", self.scale.to_string(), "must be in (0, 1]"));
        }
        if self.num_patches < self.num_centroids {
            return Err(GalaxyError::insufficient("patches", self.num_centroids, self.num_patches));
        }
        Ok(())
    }

    fn prepare(&self, store: &dyn ImageStore, id: u64) -> Result<Array3<f64>> {
        let mut image: RawImage = store.load(id)?;
        if let Some(size) = self.crop_size {
            image.crop(size)?;
        }
        image.rescale(self.scale)?;
        Ok(image.to_array())
    }

    fn preprocess(&self, patches: &mut Array2<f64>) -> Result<()> {
        normalize_patches(patches);
        if let Some(zca) = &self.whitening {
            *patches = zca.transform(patches)?;
        }
        Ok(())
    }

    /// Learn the whitening transform and codebook from random training patches
    ///
    /// Patches are spread evenly over the images in `store`; any earlier fit
    /// is discarded.
    pub fn fit(&mut self, store: &dyn ImageStore) -> Result<&mut Self> {
        self.validate()?;
        self.whitening = None;
        self.kmeans = None;

        let ids = store.ids();
        if ids.is_empty() {
            return Err(GalaxyError::insufficient("training images", 1, 0));
        }
        let n_images = ids.len();
        let per_image = self.num_patches / n_images;
        let extra = self.num_patches % n_images;
        info!(
            patches = self.num_patches,
            images = n_images,
            rf_size = self.rf_size,
            "Sampling training patches"
        );

        let sampled: Vec<Vec<Array1<f64>>> = ids
            .par_iter()
            .enumerate()
            .filter(|(j, _)| per_image > 0 || *j < extra)
            .map(|(j, &id)| {
                let count = per_image + usize::from(j < extra);
                let image = self.prepare(store, id)?;
                let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.wrapping_add(j as u64));
                (0..count)
                    .map(|_| random_patch(&image, self.rf_size, &mut rng))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let dim = patch_dim(self.rf_size);
        let mut patches = Array2::zeros((self.num_patches, dim));
        for (mut dst, src) in patches.axis_iter_mut(Axis(0)).zip(sampled.iter().flatten()) {
            dst.assign(src);
        }

        normalize_patches(&mut patches);
        if self.whiten {
            let mut zca = ZcaWhitening::new(WHITENING_EPSILON);
            zca.fit(&patches)?;
            patches = zca.transform(&patches)?;
            self.whitening = Some(zca);
        }

        let mut kmeans = KMeans::new(self.num_centroids)
            .with_max_iter(self.max_iter)
            .with_random_state(self.random_state);
        kmeans.fit(&patches)?;

        if let Some(centroids) = kmeans.centroids() {
            info!(
                centroids = centroids.nrows(),
                unique = unique_rows(centroids),
                iterations = kmeans.n_iter,
                "Learned patch codebook"
            );
        }
        self.kmeans = Some(kmeans);
        Ok(self)
    }

    /// Features of one preprocessed image
    fn encode(&self, kmeans: &KMeans, image: &Array3<f64>) -> Result<Array1<f64>> {
        let (mut patches, (grid_rows, grid_cols)) = dense_patches(image, self.rf_size, self.stride)?;
        self.preprocess(&mut patches)?;
        let distances = kmeans.distances(&patches)?;

        let k = self.num_centroids;
        let p = self.pooling;
        let mut features = Array1::zeros(self.feature_dim());
        for (i, d) in distances.axis_iter(Axis(0)).enumerate() {
            // triangle activation
            let mean = d.sum() / k as f64;
            let region_r = ((i / grid_cols) * p / grid_rows).min(p - 1);
            let region_c = ((i % grid_cols) * p / grid_cols).min(p - 1);
            let offset = (region_r * p + region_c) * k;
            for (c, &dist) in d.iter().enumerate() {
                features[offset + c] += (mean - dist).max(0.0);
            }
        }
        Ok(features)
    }

    /// Features for the given galaxies, one row each
    pub fn transform_ids(&self, store: &dyn ImageStore, ids: &[u64]) -> Result<Array2<f64>> {
        let kmeans = self.kmeans.as_ref().ok_or(GalaxyError::ModelNotFitted)?;

        let rows: Vec<Array1<f64>> = ids
            .par_iter()
            .map(|&id| {
                let image = self.prepare(store, id)?;
                self.encode(kmeans, &image)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array2::zeros((ids.len(), self.feature_dim()));
        for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(rows.iter()) {
            dst.assign(src);
        }
        debug!(rows = out.nrows(), cols = out.ncols(), "Encoded images");
        Ok(out)
    }

    /// Features for the first `n` galaxies of `store`
    pub fn transform(&self, store: &dyn ImageStore, n: usize) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(GalaxyError::ModelNotFitted);
        }
        let ids = store.ids();
        if n > ids.len() {
            return Err(GalaxyError::insufficient("training images", n, ids.len()));
        }
        info!(rows = n, features = self.feature_dim(), "Transforming images");
        self.transform_ids(store, &ids[..n])
    }
}

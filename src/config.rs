//! Experiment settings
//!
//! Paths to the competition data plus run-wide knobs. Settings are loaded
//! from a JSON file when one is given and then overridden from the CLI.

use crate::error::{GalaxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of probability columns in the solution schema
pub const N_CLASSES: usize = 37;

/// Column names of the solution and submission files, in competition order
pub const CLASS_NAMES: [&str; N_CLASSES] = [
    "Class1.1", "Class1.2", "Class1.3",
    "Class2.1", "Class2.2",
    "Class3.1", "Class3.2",
    "Class4.1", "Class4.2",
    "Class5.1", "Class5.2", "Class5.3", "Class5.4",
    "Class6.1", "Class6.2",
    "Class7.1", "Class7.2", "Class7.3",
    "Class8.1", "Class8.2", "Class8.3", "Class8.4", "Class8.5", "Class8.6", "Class8.7",
    "Class9.1", "Class9.2", "Class9.3",
    "Class10.1", "Class10.2", "Class10.3",
    "Class11.1", "Class11.2", "Class11.3", "Class11.4", "Class11.5", "Class11.6",
];

/// Number of answers per decision-tree question, in column order
pub const QUESTION_SIZES: [usize; 11] = [3, 2, 2, 2, 4, 2, 3, 7, 3, 3, 6];

/// Column ranges of each question group
pub fn question_groups() -> Vec<std::ops::Range<usize>> {
    let mut start = 0;
    QUESTION_SIZES
        .iter()
        .map(|&size| {
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Run-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the competition data
    pub data_dir: PathBuf,
    /// Training images directory, relative to `data_dir` unless absolute
    pub train_images: PathBuf,
    /// Test images directory, relative to `data_dir` unless absolute
    pub test_images: PathBuf,
    /// Training solutions CSV, relative to `data_dir` unless absolute
    pub solutions_file: PathBuf,
    /// Where submission files are written
    pub output_dir: PathBuf,
    /// Seed shared by samplers, splitters and estimators
    pub random_state: u64,
    /// Worker threads for estimators (None = rayon default)
    pub n_jobs: Option<usize>,
    pub experiment: ExperimentOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            train_images: PathBuf::from("images_training_rev1"),
            test_images: PathBuf::from("images_test_rev1"),
            solutions_file: PathBuf::from("training_solutions_rev1.csv"),
            output_dir: PathBuf::from("submissions"),
            random_state: 42,
            n_jobs: None,
            experiment: ExperimentOptions::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GalaxyError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("train_images", &self.train_images),
            ("test_images", &self.test_images),
            ("solutions_file", &self.solutions_file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(GalaxyError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.n_jobs == Some(0) {
            return Err(GalaxyError::InvalidParameter {
                name: "n_jobs".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.experiment.validate()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn train_images_path(&self) -> PathBuf {
        self.resolve(&self.train_images)
    }

    pub fn test_images_path(&self) -> PathBuf {
        self.resolve(&self.test_images)
    }

    pub fn solutions_path(&self) -> PathBuf {
        self.resolve(&self.solutions_file)
    }

    /// Submission path for a file name
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Hyperparameters and sample sizes of the experiment scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentOptions {
    /// Side of the centered square crop applied before rescaling
    pub crop_size: u32,
    /// Rescale factor for raw pixel features
    pub scale: f64,
    /// Training rows used by the sampled experiments
    pub n_samples: usize,
    /// Patch side for k-means features
    pub rf_size: usize,
    pub num_centroids: usize,
    pub num_patches: usize,
    /// Rescale factor applied to images before patch extraction
    pub kmeans_scale: f64,
    /// ZCA-whiten patches before clustering
    pub whiten: bool,
    pub n_estimators: usize,
    pub central_pixel_clusters: usize,
    pub grid_n_estimators: Vec<usize>,
    pub ridge_alpha: f64,
    /// Cap on training rows for the full-set experiments (None = all)
    pub max_train_rows: Option<usize>,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            crop_size: 150,
            scale: 0.1,
            n_samples: 7000,
            rf_size: 6,
            num_centroids: 100,
            num_patches: 400_000,
            kmeans_scale: 0.2,
            whiten: true,
            n_estimators: 50,
            central_pixel_clusters: 30,
            grid_n_estimators: vec![15, 50, 100, 250],
            ridge_alpha: 14.0,
            max_train_rows: None,
        }
    }
}

impl ExperimentOptions {
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| GalaxyError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        if self.crop_size == 0 {
            return Err(invalid("crop_size", "0".to_string(), "must be positive"));
        }
        for (name, scale) in [("scale", self.scale), ("kmeans_scale", self.kmeans_scale)] {
            if !(scale > 0.0 && scale <= 1.0) {
                return Err(invalid(name, scale.to_string(), "must be in (0, 1]"));
            }
        }
        for (name, value) in [
            ("n_samples", self.n_samples),
            ("rf_size", self.rf_size),
            ("num_centroids", self.num_centroids),
            ("n_estimators", self.n_estimators),
            ("central_pixel_clusters", self.central_pixel_clusters),
        ] {
            if value == 0 {
                return Err(invalid(name, "0".to_string(), "must be positive"));
            }
        }
        if self.num_patches < self.num_centroids {
            return Err(invalid(
                "num_patches",
                self.num_patches.to_string(),
                "must be at least num_centroids",
            ));
        }
        if !(self.ridge_alpha >= 0.0 && self.ridge_alpha.is_finite()) {
            return Err(invalid("ridge_alpha", self.ridge_alpha.to_string(), "must be non-negative"));
        }
        if self.max_train_rows == Some(0) {
            return Err(invalid("max_train_rows", "0".to_string(), "must be positive"));
        }
        Ok(())
    }
}

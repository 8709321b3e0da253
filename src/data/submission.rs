//! Submission writer

use crate::config::{CLASS_NAMES, N_CLASSES};
use crate::error::{GalaxyError, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Predicted probabilities aligned to test galaxy IDs
#[derive(Debug, Clone)]
pub struct Submission {
    ids: Vec<u64>,
    predictions: Array2<f64>,
}

impl Submission {
    pub fn new(ids: Vec<u64>, predictions: Array2<f64>) -> Result<Self> {
        if predictions.nrows() != ids.len() || predictions.ncols() != N_CLASSES {
            return Err(GalaxyError::shape(
                format!("({}, {})", ids.len(), N_CLASSES),
                format!("{:?}", predictions.dim()),
            ));
        }
        Ok(Self { ids, predictions })
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn predictions(&self) -> &Array2<f64> {
        &self.predictions
    }

    /// Write `GalaxyID,Class1.1,...` with values clipped to `[0, 1]`
    pub fn to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut columns = Vec::with_capacity(N_CLASSES + 1);
        columns.push(Series::new("GalaxyID".into(), self.ids.clone()));
        for (c, name) in CLASS_NAMES.iter().enumerate() {
            let values: Vec<f64> = self
                .predictions
                .column(c)
                .iter()
                .map(|v| v.clamp(0.0, 1.0))
                .collect();
            columns.push(Series::new((*name).into(), values));
        }
        let mut df = DataFrame::new(columns)?;

        let mut file = std::fs::File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        info!(path = %path.display(), rows = self.ids.len(), "Wrote submission");
        Ok(())
    }
}

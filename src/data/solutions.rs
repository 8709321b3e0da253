//! Training solution store
//!
//! The ground-truth probability vectors are loaded once per experiment and
//! shared read-only by reference.

use crate::config::{CLASS_NAMES, N_CLASSES};
use crate::error::{GalaxyError, Result};
use ndarray::{Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tracing::info;

const ID_COLUMN: &str = "GalaxyID";

/// Galaxy IDs and their solution rows, aligned positionally
#[derive(Debug, Clone)]
pub struct TrainSolutions {
    ids: Vec<u64>,
    data: Array2<f64>,
}

impl TrainSolutions {
    /// Read `GalaxyID` plus the 37 class columns from a CSV file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GalaxyError::DataLoad(format!("{} does not exist", path.display())));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let ids: Vec<u64> = df
            .column(ID_COLUMN)
            .map_err(|_| GalaxyError::DataLoad(format!("missing column {}", ID_COLUMN)))?
            .cast(&DataType::UInt64)?
            .u64()?
            .into_iter()
            .map(|v| v.ok_or_else(|| GalaxyError::DataLoad("null GalaxyID".to_string())))
            .collect::<Result<_>>()?;

        let columns: Vec<Vec<f64>> = CLASS_NAMES
            .iter()
            .map(|name| {
                let series = df
                    .column(name)
                    .map_err(|_| GalaxyError::DataLoad(format!("missing column {}", name)))?
                    .cast(&DataType::Float64)?;
                // non-numeric cells cast to null
                series
                    .f64()?
                    .into_iter()
                    .map(|v| {
                        v.ok_or_else(|| {
                            GalaxyError::DataLoad(format!("null or non-numeric value in column {}", name))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<_>>()?;

        let data = Array2::from_shape_fn((ids.len(), N_CLASSES), |(r, c)| columns[c][r]);
        info!(path = %path.display(), rows = ids.len(), "Loaded training solutions");
        Self::from_parts(ids, data)
    }

    /// Build from IDs and a matching solution matrix
    pub fn from_parts(ids: Vec<u64>, data: Array2<f64>) -> Result<Self> {
        if ids.len() != data.nrows() {
            return Err(GalaxyError::shape(
                format!("{} solution rows", ids.len()),
                format!("{} solution rows", data.nrows()),
            ));
        }
        Ok(Self { ids, data })
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn n_classes(&self) -> usize {
        self.data.ncols()
    }

    /// The first `n` rows
    pub fn head(&self, n: usize) -> Result<Self> {
        if n > self.len() {
            return Err(GalaxyError::insufficient("solution rows", n, self.len()));
        }
        let indices: Vec<usize> = (0..n).collect();
        Ok(self.select(&indices))
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            ids: indices.iter().map(|&i| self.ids[i]).collect(),
            data: self.data.select(Axis(0), indices),
        }
    }

    /// `n` distinct rows drawn at random
    pub fn sample(&self, n: usize, seed: u64) -> Result<Self> {
        if n > self.len() {
            return Err(GalaxyError::insufficient("solution rows", n, self.len()));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut rng);
        indices.truncate(n);
        Ok(self.select(&indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;

    fn write_solutions(rows: &[(u64, f64)]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", ID_COLUMN).unwrap();
        for name in CLASS_NAMES {
            write!(file, ",{}", name).unwrap();
        }
        writeln!(file).unwrap();
        for (id, value) in rows {
            write!(file, "{}", id).unwrap();
            for c in 0..N_CLASSES {
                write!(file, ",{}", if c == 0 { *value } else { 0.0 }).unwrap();
            }
            writeln!(file).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_solutions() {
        let file = write_solutions(&[(100008, 0.383), (100023, 0.327), (100053, 0.765)]);
        let solutions = TrainSolutions::load(file.path()).unwrap();

        assert_eq!(solutions.len(), 3);
        assert_eq!(solutions.n_classes(), N_CLASSES);
        assert_eq!(solutions.ids(), &[100008, 100023, 100053]);
        assert!((solutions.data()[[2, 0]] - 0.765).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_empty_and_non_numeric_cells() {
        for bad in ["", "abc"] {
            let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
            write!(file, "{}", ID_COLUMN).unwrap();
            for name in CLASS_NAMES {
                write!(file, ",{}", name).unwrap();
            }
            writeln!(file).unwrap();
            for (row, id) in [100008u64, 100023, 100053].iter().enumerate() {
                write!(file, "{}", id).unwrap();
                for c in 0..N_CLASSES {
                    if row == 1 && c == 0 {
                        write!(file, ",{}", bad).unwrap();
                    } else {
                        write!(file, ",0.5").unwrap();
                    }
                }
                writeln!(file).unwrap();
            }
            file.flush().unwrap();

            let err = TrainSolutions::load(file.path()).unwrap_err();
            assert!(matches!(err, GalaxyError::DataLoad(_)), "cell {:?}: {:?}", bad, err);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = TrainSolutions::load(Path::new("/nonexistent/solutions.csv")).unwrap_err();
        assert!(matches!(err, GalaxyError::DataLoad(_)));
    }

    #[test]
    fn test_load_missing_column() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "GalaxyID,Class1.1").unwrap();
        writeln!(file, "1,0.5").unwrap();
        file.flush().unwrap();
        assert!(TrainSolutions::load(file.path()).is_err());
    }

    #[test]
    fn test_head_select_and_sample() {
        let solutions = TrainSolutions::from_parts(
            vec![1, 2, 3, 4],
            array![[0.1, 0.9], [0.2, 0.8], [0.3, 0.7], [0.4, 0.6]],
        )
        .unwrap();

        let head = solutions.head(2).unwrap();
        assert_eq!(head.ids(), &[1, 2]);
        assert!(solutions.head(5).is_err());

        let picked = solutions.select(&[3, 0]);
        assert_eq!(picked.ids(), &[4, 1]);
        assert_eq!(picked.data()[[0, 0]], 0.4);

        let sampled = solutions.sample(3, 7).unwrap();
        let mut ids = sampled.ids().to_vec();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_from_parts_mismatch() {
        let err = TrainSolutions::from_parts(vec![1], array![[0.5], [0.5]]).unwrap_err();
        assert!(matches!(err, GalaxyError::ShapeMismatch { .. }));
    }
}

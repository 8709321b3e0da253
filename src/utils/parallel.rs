//! Bounded rayon pools for `n_jobs`

use crate::error::{GalaxyError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use the global rayon pool)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(n_threads: Option<usize>) -> Self {
        Self { n_threads }
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }

    /// Run `f` inside a pool sized to `n_threads`, or on the global pool
    pub fn install<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> Result<T> + Send,
    {
        match self.n_threads {
            None => f(),
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| GalaxyError::Computation(format!("thread pool: {}", e)))?;
                pool.install(f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_bounded_pool() {
        let config = ParallelConfig::new(Some(2));
        let threads = config.install(|| Ok(rayon::current_num_threads())).unwrap();
        assert_eq!(threads, 2);
        assert_eq!(config.num_threads(), 2);
    }

    #[test]
    fn test_install_global_pool() {
        let config = ParallelConfig::default();
        let value = config.install(|| Ok(7)).unwrap();
        assert_eq!(value, 7);
    }
}

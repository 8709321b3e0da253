//! Image sources keyed by galaxy ID

use super::raw_image::RawImage;
use crate::error::{GalaxyError, Result};
use image::RgbImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A read-only collection of galaxy images
pub trait ImageStore: Send + Sync {
    /// Galaxy IDs in a stable order
    fn ids(&self) -> &[u64];

    /// Load one image
    fn load(&self, id: u64) -> Result<RawImage>;

    fn len(&self) -> usize {
        self.ids().len()
    }

    fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

/// Sorted galaxy IDs of the `<id>.jpg` files in a directory
pub fn list_galaxy_ids(dir: &Path) -> Result<Vec<u64>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        GalaxyError::DataLoad(format!("cannot list {}: {}", dir.display(), e))
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_jpg = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("jpg"));
        if !is_jpg {
            continue;
        }
        if let Some(id) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse().ok()) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Images stored as `<dir>/<id>.jpg`
#[derive(Debug, Clone)]
pub struct DirectoryImageStore {
    dir: PathBuf,
    ids: Vec<u64>,
}

impl DirectoryImageStore {
    /// Index every image in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let ids = list_galaxy_ids(&dir)?;
        debug!(dir = %dir.display(), images = ids.len(), "Indexed image directory");
        Ok(Self { dir, ids })
    }

    /// Restrict the store to a known ID list (e.g. the solution file order)
    pub fn with_ids(dir: impl Into<PathBuf>, ids: Vec<u64>) -> Self {
        Self { dir: dir.into(), ids }
    }

    pub fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}.jpg", id))
    }
}

impl ImageStore for DirectoryImageStore {
    fn ids(&self) -> &[u64] {
        &self.ids
    }

    fn load(&self, id: u64) -> Result<RawImage> {
        RawImage::open(&self.path_for(id))
    }
}

/// Images held in memory, for synthetic data and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryImageStore {
    ids: Vec<u64>,
    images: HashMap<u64, RgbImage>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u64, image: RgbImage) {
        if self.images.insert(id, image).is_none() {
            self.ids.push(id);
        }
    }
}

impl ImageStore for MemoryImageStore {
    fn ids(&self) -> &[u64] {
        &self.ids
    }

    fn load(&self, id: u64) -> Result<RawImage> {
        self.images
            .get(&id)
            .cloned()
            .map(RawImage::from_rgb)
            .ok_or_else(|| GalaxyError::DataLoad(format!("no image for galaxy {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_list_galaxy_ids_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for id in [300u64, 100, 200] {
            RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))
                .save(dir.path().join(format!("{}.jpg", id)))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let ids = list_galaxy_ids(dir.path()).unwrap();
        assert_eq!(ids, vec![100, 200, 300]);

        let store = DirectoryImageStore::open(dir.path()).unwrap();
        assert_eq!(store.load(200).unwrap().dims(), (4, 4));
        assert!(store.load(999).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let err = list_galaxy_ids(Path::new("/nonexistent/galaxy/images")).unwrap_err();
        assert!(matches!(err, GalaxyError::DataLoad(_)));
    }

    #[test]
    fn test_memory_store_keeps_insertion_order() {
        let mut store = MemoryImageStore::new();
        store.insert(7, RgbImage::new(2, 2));
        store.insert(3, RgbImage::new(2, 2));
        store.insert(7, RgbImage::new(3, 3));
        assert_eq!(store.ids(), &[7, 3]);
        assert_eq!(store.load(7).unwrap().dims(), (3, 3));
    }
}

//! Integration test: k-means features over images on disk

use galaxy_zoo::data::{DirectoryImageStore, ImageStore};
use galaxy_zoo::features::{pixel_features, KMeansFeatures};
use galaxy_zoo::GalaxyError;
use image::{Rgb, RgbImage};

fn image_dir(n: u64, side: u32) -> (tempfile::TempDir, DirectoryImageStore) {
    let dir = tempfile::tempdir().unwrap();
    for id in 0..n {
        let img = RgbImage::from_fn(side, side, |x, y| {
            let v = ((x * 29 + y * 17 + id as u32 * 41) % 256) as u8;
            Rgb([v, 255 - v, (x * 8) as u8])
        });
        img.save(dir.path().join(format!("{}.jpg", 500 + id))).unwrap();
    }
    let store = DirectoryImageStore::open(dir.path()).unwrap();
    (dir, store)
}

#[test]
fn test_codebook_rows_independent_of_patch_count() {
    let (_dir, store) = image_dir(5, 24);
    for num_patches in [10, 60, 250] {
        let mut km = KMeansFeatures::new(4, 10, num_patches)
            .with_crop(Some(20), 0.5)
            .with_max_iter(5);
        km.fit(&store).unwrap();
        assert_eq!(km.centroids().unwrap().dim(), (10, 4 * 4 * 3));
    }
}

#[test]
fn test_transform_rows_have_fixed_width() {
    let (_dir, store) = image_dir(6, 24);
    let mut km = KMeansFeatures::new(3, 6, 120)
        .with_crop(Some(20), 0.5)
        .with_pooling(3)
        .with_max_iter(5);
    km.fit(&store).unwrap();

    for n in [1, 4, 6] {
        let x = km.transform(&store, n).unwrap();
        assert_eq!(x.dim(), (n, 6 * 9));
        assert_eq!(x.ncols(), km.feature_dim());
    }

    let err = km.transform(&store, 7).unwrap_err();
    assert!(matches!(err, GalaxyError::InsufficientSample { requested: 7, available: 6, .. }));
}

#[test]
fn test_fit_without_images() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryImageStore::open(dir.path()).unwrap();
    assert!(store.is_empty());
    let mut km = KMeansFeatures::new(3, 2, 10);
    assert!(matches!(km.fit(&store).unwrap_err(), GalaxyError::InsufficientSample { .. }));
}

#[test]
fn test_pixel_features_follow_store_order() {
    let (_dir, store) = image_dir(3, 16);
    let ids = store.ids().to_vec();
    assert_eq!(ids, vec![500, 501, 502]);
    let x = pixel_features(&store, &ids, 10, 0.5).unwrap();
    assert_eq!(x.dim(), (3, 5 * 5 * 3));
}

//! Integration test: experiments end-to-end on a synthetic data directory

use galaxy_zoo::config::{Settings, CLASS_NAMES, N_CLASSES};
use galaxy_zoo::experiments::{Experiment, ExperimentContext, ExperimentReport};
use galaxy_zoo::features::pixel_features;
use galaxy_zoo::training::{Dataset, EstimatorKind, ForestParams, ModelRunner, RunMode, RunnerConfig};
use galaxy_zoo::GalaxyError;
use image::{Rgb, RgbImage};
use std::fmt::Write as _;
use std::path::Path;

const N_TRAIN: u64 = 24;
const N_TEST: u64 = 6;

fn galaxy(id: u64) -> RgbImage {
    RgbImage::from_fn(40, 40, |x, y| {
        let dx = x as i64 - 20;
        let dy = y as i64 - 20;
        let glow = (255 - ((dx * dx + dy * dy) * 255 / 800).min(255)) as u8;
        let tint = ((id * 37) % 200) as u8;
        Rgb([glow, glow / 2 + tint / 4, tint])
    })
}

fn solution_row(id: u64) -> Vec<f64> {
    (0..N_CLASSES).map(|c| ((id as usize * 7 + c * 13) % 100) as f64 / 100.0).collect()
}

/// data/ with solutions, training and test images
fn write_data_dir(root: &Path) {
    write_data_dir_with(root, N_TRAIN);
}

fn write_data_dir_with(root: &Path, n_train: u64) {
    let train = root.join("images_training_rev1");
    let test = root.join("images_test_rev1");
    std::fs::create_dir_all(&train).unwrap();
    std::fs::create_dir_all(&test).unwrap();

    let mut csv = String::from("GalaxyID");
    for name in CLASS_NAMES {
        write!(csv, ",{}", name).unwrap();
    }
    csv.push('\n');
    for id in 100_000..100_000 + n_train {
        galaxy(id).save(train.join(format!("{}.jpg", id))).unwrap();
        write!(csv, "{}", id).unwrap();
        for v in solution_row(id) {
            write!(csv, ",{:.6}", v).unwrap();
        }
        csv.push('\n');
    }
    std::fs::write(root.join("training_solutions_rev1.csv"), csv).unwrap();

    for id in 200_000..200_000 + N_TEST {
        galaxy(id).save(test.join(format!("{}.jpg", id))).unwrap();
    }
}

fn small_settings(data: &Path, out: &Path) -> Settings {
    let mut settings = Settings::new().with_data_dir(data).with_output_dir(out).with_n_jobs(2);
    let opts = &mut settings.experiment;
    opts.crop_size = 30;
    opts.scale = 0.2;
    opts.n_samples = 10;
    opts.rf_size = 3;
    opts.num_centroids = 5;
    opts.num_patches = 100;
    opts.kmeans_scale = 0.5;
    opts.n_estimators = 5;
    opts.central_pixel_clusters = 3;
    opts.grid_n_estimators = vec![3, 5];
    settings
}

fn read_rows(path: &Path) -> (String, Vec<Vec<f64>>) {
    let text = std::fs::read_to_string(path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap().to_string();
    let rows = lines
        .filter(|l| !l.is_empty())
        .map(|l| l.split(',').map(|v| v.parse::<f64>().unwrap()).collect())
        .collect();
    (header, rows)
}

#[test]
fn test_average_benchmark_submission() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_data_dir(data.path());

    let ctx = ExperimentContext::load(small_settings(data.path(), out.path())).unwrap();
    assert_eq!(ctx.solutions().len(), N_TRAIN as usize);

    let report = Experiment::AverageBenchmark.run(&ctx, None).unwrap();
    let path = report.output.clone().unwrap();
    assert_eq!(path, out.path().join("sub_average_benchmark_000.csv"));
    assert_eq!(report.scores.len(), 1);

    let (header, rows) = read_rows(&path);
    assert!(header.starts_with("GalaxyID,Class1.1,Class1.2"));
    assert!(header.ends_with("Class11.6"));
    assert_eq!(rows.len(), N_TEST as usize);

    let first = &rows[0][1..];
    assert_eq!(first.len(), N_CLASSES);
    for row in &rows {
        assert_eq!(&row[1..], first);
    }
    let expected: f64 = (100_000..100_000 + N_TRAIN).map(|id| solution_row(id)[0]).sum::<f64>() / N_TRAIN as f64;
    assert!((first[0] - expected).abs() < 1e-6);
}

#[test]
fn test_random_forest_and_central_pixel_write_submissions() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_data_dir(data.path());
    let ctx = ExperimentContext::load(small_settings(data.path(), out.path())).unwrap();

    let report = Experiment::RandomForest.run(&ctx, Some(Path::new("rf.csv"))).unwrap();
    let (_, rows) = read_rows(&report.output.unwrap());
    assert_eq!(rows.len(), N_TEST as usize);
    assert!(rows.iter().all(|r| r[1..].iter().all(|v| (0.0..=1.0).contains(v))));

    let report = Experiment::CentralPixel.run(&ctx, None).unwrap();
    let (_, rows) = read_rows(&report.output.unwrap());
    assert_eq!(rows.len(), N_TEST as usize);
}

#[test]
fn test_evaluation_experiments_report_scores() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_data_dir(data.path());
    let ctx = ExperimentContext::load(small_settings(data.path(), out.path())).unwrap();

    let report = Experiment::ExtraTrees.run(&ctx, None).unwrap();
    // two grid candidates plus the holdout score
    assert_eq!(report.scores.len(), 3);
    assert!(report.output.is_none());

    let report = Experiment::KMeansRidgeRf.run(&ctx, None).unwrap();
    assert_eq!(report.scores.len(), 2);
    assert!(report.scores.iter().all(|(_, s)| s.is_finite() && *s >= 0.0));
}

fn assert_rmse_scores(report: &ExperimentReport, expected: usize) {
    assert_eq!(report.scores.len(), expected, "{}: {:?}", report.name, report.scores);
    for (label, score) in &report.scores {
        assert!(score.is_finite() && (0.0..=1.0).contains(score), "{} {}: {}", report.name, label, score);
    }
}

#[test]
fn test_cascade_experiment_cross_validates() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    // the cascade cross-validates a tenth of the training rows
    write_data_dir_with(data.path(), 60);
    let ctx = ExperimentContext::load(small_settings(data.path(), out.path())).unwrap();

    let report = Experiment::RandomForestCascade.run(&ctx, None).unwrap();
    assert_rmse_scores(&report, 3);
    assert!(report.output.is_none());

    // one column per answer once every question group has been chained
    let opts = ctx.options();
    let train_x = pixel_features(ctx.train_images(), ctx.solutions().ids(), opts.crop_size, opts.scale).unwrap();
    let test = ctx.test_images().unwrap();
    let test_x = pixel_features(test, test.ids(), opts.crop_size, opts.scale).unwrap();
    let dataset = Dataset::new(train_x, ctx.solutions().data().clone()).unwrap().with_test(test_x).unwrap();
    let kind = EstimatorKind::CascadeForest(ForestParams::default().with_n_estimators(3));
    let mut runner = ModelRunner::new(kind, RunnerConfig::default(), dataset).unwrap();
    runner.run(RunMode::Train).unwrap();
    let pred = runner.run(RunMode::Predict).unwrap().into_predictions().unwrap();
    assert_eq!(pred.dim(), (N_TEST as usize, N_CLASSES));
    assert!(pred.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_ridge_rf_experiment_scores_and_writes_submission() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_data_dir(data.path());
    let ctx = ExperimentContext::load(small_settings(data.path(), out.path())).unwrap();

    let report = Experiment::RidgeRf.run(&ctx, None).unwrap();
    assert_rmse_scores(&report, 1);

    let path = report.output.unwrap();
    assert_eq!(path, out.path().join("sub_ridge_rf_001.csv"));
    let (_, rows) = read_rows(&path);
    assert_eq!(rows.len(), N_TEST as usize);
    assert!(rows.iter().all(|r| r.len() == N_CLASSES + 1));
}

#[test]
fn test_svr_rf_experiment_scores_two_folds() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_data_dir(data.path());
    let ctx = ExperimentContext::load(small_settings(data.path(), out.path())).unwrap();

    let report = Experiment::SvrRf.run(&ctx, Some(Path::new("ignored.csv"))).unwrap();
    assert_rmse_scores(&report, 2);
    assert!(report.output.is_none());
    assert!(!out.path().join("ignored.csv").exists());
}

#[test]
fn test_kmeans_experiment_needs_enough_images() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_data_dir(data.path());
    let mut settings = small_settings(data.path(), out.path());
    settings.experiment.n_samples = 100;
    let ctx = ExperimentContext::load(settings).unwrap();

    let err = Experiment::KMeansRidgeRf.run(&ctx, None).unwrap_err();
    assert!(matches!(err, GalaxyError::InsufficientSample { requested: 100, .. }));
}

#[test]
fn test_missing_solutions_file() {
    let data = tempfile::tempdir().unwrap();
    let err = ExperimentContext::load(Settings::new().with_data_dir(data.path())).err().unwrap();
    assert!(matches!(err, GalaxyError::DataLoad(_)));
}

//! Galaxy Zoo CLI Module
//!
//! Command-line interface for listing and running experiments.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::config::Settings;
use crate::experiments::{Experiment, ExperimentContext, ExperimentReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "galaxy-zoo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Galaxy Zoo experiment runner")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Competition data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory for submission files
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Worker threads for estimators
    #[arg(long, global = true)]
    pub n_jobs: Option<usize>,

    /// Random seed
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one experiment
    Run {
        #[arg(value_enum)]
        experiment: Experiment,

        /// Submission file name (defaults per experiment)
        #[arg(short, long)]
        outfile: Option<PathBuf>,
    },

    /// List the available experiments
    List,
}

impl Cli {
    /// Settings from the config file (or defaults) with CLI overrides applied
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        if let Some(dir) = &self.data_dir {
            settings = settings.with_data_dir(dir);
        }
        if let Some(dir) = &self.output_dir {
            settings = settings.with_output_dir(dir);
        }
        if let Some(n) = self.n_jobs {
            settings = settings.with_n_jobs(n);
        }
        if let Some(seed) = self.seed {
            settings = settings.with_random_state(seed);
        }
        settings.validate()?;
        Ok(settings)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_list() -> anyhow::Result<()> {
    section("Experiments");
    for experiment in Experiment::ALL {
        let outfile = experiment.default_outfile().unwrap_or("-");
        println!(
            "  {:<28} {}",
            accent(experiment.name()),
            muted(experiment.description())
        );
        println!("  {:<28} {}", "", dim(outfile));
    }
    println!();
    Ok(())
}

pub fn cmd_run(settings: Settings, experiment: Experiment, outfile: Option<PathBuf>) -> anyhow::Result<()> {
    section(&format!("Experiment {}", experiment.name()));
    println!("  {}", kv("data", &settings.data_dir.display().to_string()));
    println!("  {}", kv("seed", &settings.random_state.to_string()));

    step_run("Loading training solutions");
    let ctx = ExperimentContext::load(settings)?;
    step_ok(&format!("{} training galaxies", ctx.solutions().len()));

    let report = experiment.run(&ctx, outfile.as_deref())?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ExperimentReport) {
    section("Summary");
    if report.scores.is_empty() {
        println!("  {}", dim("no scores recorded"));
    }
    for (label, score) in &report.scores {
        println!("  {:<40} {}", muted(label), format!("{:.6}", score).white().bold());
    }
    if let Some(path) = &report.output {
        println!("  {}", kv("submission", &path.display().to_string()));
    }
    println!("  {}", kv("elapsed", &format!("{:.2}s", report.elapsed_secs)));
    println!();
    step_ok(&format!("{} completed", report.name));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "galaxy-zoo",
            "run",
            "ridge_rf_001",
            "--outfile",
            "out.csv",
            "--data-dir",
            "/srv/gz",
            "--n-jobs",
            "2",
        ])
        .unwrap();
        match &cli.command {
            Commands::Run { experiment, outfile } => {
                assert_eq!(*experiment, Experiment::RidgeRf);
                assert_eq!(outfile.as_deref(), Some(std::path::Path::new("out.csv")));
            }
            Commands::List => panic!("expected run"),
        }
        let settings = cli.settings().unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/gz"));
        assert_eq!(settings.n_jobs, Some(2));
    }

    #[test]
    fn test_unknown_experiment_rejected() {
        assert!(Cli::try_parse_from(["galaxy-zoo", "run", "neural_net"]).is_err());
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let cli = Cli::try_parse_from(["galaxy-zoo", "--n-jobs", "0", "list"]).unwrap();
        assert!(cli.settings().is_err());
    }
}

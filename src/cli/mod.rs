//! Command-line interface: run the pipeline or summarize a dataset

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::evaluation::EvaluationReport;
use crate::pipeline::{Pipeline, PipelineConfig, RunOutcome, Variant};
use crate::utils::{DataLoader, DatasetSummary};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "student-outcome")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predict student dropout, enrollment and graduation outcomes")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train, evaluate and write the JSON report
    Run {
        /// JSON configuration file; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Report file, overwritten
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Built-in model setup
        #[arg(long, value_enum)]
        variant: Option<Variant>,

        /// Field separator of the input file
        #[arg(long)]
        separator: Option<char>,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// Random seed for split, folds and models
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the derived features
        #[arg(long)]
        no_feature_engineering: bool,
    },

    /// Show shape, class balance and missing values of a dataset
    Describe {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Field separator of the input file
        #[arg(long, default_value = ";")]
        separator: char,

        /// Target column name
        #[arg(short, long, default_value = "Target")]
        target: String,
    },
}

/// Command-line overrides for `run`
#[derive(Debug, Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub variant: Option<Variant>,
    pub separator: Option<char>,
    pub target: Option<String>,
    pub seed: Option<u64>,
    pub no_feature_engineering: bool,
}

impl RunArgs {
    /// Merge flags over the config file (or defaults)
    pub fn into_config(self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(data) = self.data {
            config = config.with_data_path(data);
        }
        if let Some(output) = self.output {
            config = config.with_output_path(output);
        }
        if let Some(variant) = self.variant {
            config = config.with_variant(variant);
        }
        if let Some(sep) = self.separator {
            config = config.with_separator(sep);
        }
        if let Some(target) = self.target {
            config = config.with_target_column(&target);
        }
        if let Some(seed) = self.seed {
            config = config.with_random_state(seed);
        }
        if self.no_feature_engineering {
            config = config.with_feature_engineering(false);
        }
        Ok(config)
    }
}

// ─── Printing ──────────────────────────────────────────────────────────────────

fn print_summary(summary: &DatasetSummary) {
    kv("Rows", &summary.n_rows.to_string());
    kv("Features", &summary.n_features.to_string());
    kv("Missing values", &summary.missing_values.to_string());
    println!();
    println!("  {}", muted(&format!("{} distribution", summary.target_column)));
    for ((name, count), (_, pct)) in summary.class_counts.iter().zip(summary.class_percentages()) {
        println!("  {:>12}  {:>6}  {}", name, count, dim(&format!("{:.1}%", pct)));
    }
}

/// Print metrics, confusion matrix and per-class table
pub fn print_evaluation(eval: &EvaluationReport) {
    section("Evaluation");
    kv("Macro F1-Score", &format!("{:.4}", eval.macro_f1));
    kv("Weighted F1-Score", &format!("{:.4}", eval.weighted_f1));
    kv("Balanced Accuracy", &format!("{:.4}", eval.balanced_accuracy));
    kv("Accuracy", &format!("{:.4}", eval.accuracy));

    println!();
    println!("  {}", muted("Confusion Matrix"));
    let header: String = eval.labels.iter().map(|l| format!("{:>10}", l)).collect();
    println!("  {:>12}{}", "", header.bold());
    for (label, row) in eval.labels.iter().zip(&eval.confusion_matrix) {
        let cells: String = row.iter().map(|c| format!("{:>10}", c)).collect();
        println!("  {:>12}{}", label.bold(), cells);
    }

    println!();
    println!("  {}", muted("Per-Class Metrics"));
    println!(
        "  {:>12}  {:>9}  {:>7}  {:>8}  {:>7}",
        "", "Precision", "Recall", "F1-Score", "Support"
    );
    for (label, m) in eval.labels.iter().zip(&eval.per_class) {
        println!(
            "  {:>12}  {:>9.3}  {:>7.3}  {:>8.3}  {:>7}",
            label, m.precision, m.recall, m.f1_score, m.support
        );
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: RunArgs) -> anyhow::Result<RunOutcome> {
    let config = args.into_config()?;
    let pipeline = Pipeline::new(config)?;
    let cfg = pipeline.config();

    section("Student outcome pipeline");
    kv("Data", &cfg.data_path.display().to_string());
    kv("Model", &cfg.model.describe());
    kv("Seed", &cfg.random_state.to_string());

    step_run("Running");
    let start = Instant::now();
    let outcome = pipeline.run()?;
    step_done(&format!("{:.2}s", start.elapsed().as_secs_f64()));

    print_evaluation(&outcome.evaluation);

    println!();
    kv("Training time", &format!("{:.2}s", outcome.report.training_time_seconds));
    if let Some(best) = &outcome.report.pipeline_documentation.best_params {
        kv("Best params", &best.to_string());
    }
    println!("  {} report written to {}", ok("✓"), cfg.output_path.display());
    println!();
    Ok(outcome)
}

pub fn cmd_describe(data: &Path, separator: char, target: &str) -> anyhow::Result<DatasetSummary> {
    let sep = u8::try_from(separator)
        .ok()
        .filter(|b| b.is_ascii())
        .ok_or_else(|| anyhow::anyhow!("separator {:?} is not a single ASCII character", separator))?;

    section("Describe");
    step_run("Loading data");
    let df = DataLoader::new(sep).load_csv(data)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let summary = DatasetSummary::from_frame(&df, target)?;
    println!();
    print_summary(&summary);
    println!();
    Ok(summary)
}

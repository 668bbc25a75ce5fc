#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::backend::{Autodiff, Wgpu};
use clap::Parser;

use pose_experiment::config::ExperimentConfig;
use pose_experiment::error::TrainingError;
use pose_experiment::experiment::{create_logger, model_name, ExperimentLogger};
use pose_experiment::model::{KeypointRegressor, KeypointRegressorConfig};
use pose_experiment::optim::get_optimizer;
use pose_experiment::training::{SyntheticKeypoints, Trainer};

type TrainBackend = Autodiff<Wgpu<f32, i32>>;

/// Train a keypoint regression network.
#[derive(Parser)]
#[command(name = "train", about = "Train a keypoint regression network")]
struct Cli {
    /// Path to TOML experiment configuration
    #[arg(long)]
    cfg: PathBuf,

    /// Extra tag appended to the run name
    #[arg(long, default_value = "")]
    flag: String,

    /// Phase name used in the log file name
    #[arg(long, default_value = "train")]
    phase: String,

    /// Override the root output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override train.end_epoch
    #[arg(long)]
    epochs: Option<usize>,

    /// Override learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Resume from the run's checkpoint if present
    #[arg(long)]
    resume: bool,

    /// Resume from an earlier run directory or checkpoint file (implies --resume)
    #[arg(long)]
    resume_from: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ExperimentConfig::load(&cli.cfg)
        .with_context(|| format!("loading config from {}", cli.cfg.display()))?;

    // Apply CLI overrides
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(epochs) = cli.epochs {
        config.train.end_epoch = epochs;
    }
    if let Some(lr) = cli.lr {
        config.train.lr = lr;
    }
    if cli.resume {
        config.train.resume = true;
    }
    if let Some(source) = cli.resume_from {
        config.train.resume = true;
        config.train.resume_from = Some(source);
    }
    config.validate().context("validating config overrides")?;

    let logger = create_logger(&config, &cli.cfg, &cli.flag, &cli.phase)
        .context("setting up experiment directory")?;
    tracing::dispatcher::with_default(&logger.dispatch, || run(config, &logger))
}

fn run(config: ExperimentConfig, logger: &ExperimentLogger) -> Result<()> {
    tracing::info!("{:#?}", config);
    let (name, full_name) = model_name(&config.model);
    tracing::info!("=> model {} ({})", name, full_name);

    let device = Default::default();
    let model_config = KeypointRegressorConfig::from_model_config(&config.model);
    let model = model_config.init::<TrainBackend>(&device);

    let mut optimizer =
        get_optimizer::<TrainBackend, KeypointRegressor<TrainBackend>>(&config.train)
            .ok_or_else(|| TrainingError::UnknownOptimizer(config.train.optimizer.clone()))?;

    let (train_data, valid_data) = SyntheticKeypoints::split(
        model_config.feature_dim,
        model_config.output_dim(),
        config.dataset.train_samples,
        config.dataset.valid_samples,
        config.dataset.seed,
    );

    let trainer = Trainer::new(
        config,
        &logger.final_output_dir,
        &logger.tensorboard_log_dir,
    )?;
    let start = trainer.start_state(model, &device)?;
    let (_, summary) = trainer.fit(start, &mut optimizer, &train_data, &valid_data, &device)?;

    match summary.best_epoch {
        Some(epoch) => tracing::info!(
            "Training complete: {} epochs, best valid_loss {:.5} at epoch {}",
            summary.epochs_run,
            summary.best_perf,
            epoch
        ),
        None => tracing::info!(
            "Training complete: {} epochs, no improvement over {:.5}",
            summary.epochs_run,
            summary.best_perf
        ),
    }
    Ok(())
}

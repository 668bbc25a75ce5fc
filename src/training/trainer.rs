use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::checkpoint::{
    load_checkpoint, save_checkpoint, save_state_dict, Checkpoint, CheckpointValue,
    CHECKPOINT_FILENAME,
};
use crate::config::ExperimentConfig;
use crate::error::TrainingError;
use crate::experiment::model_name;
use crate::model::KeypointRegressor;
use crate::optim::TrainOptimizer;
use crate::training::dataset::SyntheticKeypoints;
use crate::training::metrics::{EpochMetrics, MetricsLogger};

/// State saved at the end of training.
pub const FINAL_STATE_FILENAME: &str = "final_state.pth.tar";

/// Where training starts: epoch, best validation loss so far, and the model.
pub struct StartState<B: Backend> {
    pub begin_epoch: usize,
    pub best_perf: f64,
    pub model: KeypointRegressor<B>,
}

/// Outcome of [`Trainer::fit`].
#[derive(Debug, Clone)]
pub struct FitSummary {
    pub epochs_run: usize,
    pub best_perf: f64,
    pub best_epoch: Option<usize>,
    pub last_valid_loss: f64,
}

/// Epoch loop: train, validate, log metrics, checkpoint.
pub struct Trainer {
    config: ExperimentConfig,
    output_dir: PathBuf,
    metrics: MetricsLogger,
}

impl Trainer {
    pub fn new(
        config: ExperimentConfig,
        output_dir: &Path,
        metrics_dir: &Path,
    ) -> Result<Self, TrainingError> {
        config.validate()?;
        let metrics = MetricsLogger::new(metrics_dir)?;
        Ok(Trainer {
            config,
            output_dir: output_dir.to_path_buf(),
            metrics,
        })
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(CHECKPOINT_FILENAME)
    }

    /// Checkpoint read on resume: `train.resume_from` when set (a run directory
    /// or a checkpoint file), else this run's own checkpoint.
    pub fn resume_path(&self) -> PathBuf {
        match &self.config.train.resume_from {
            Some(source) if source.is_dir() => source.join(CHECKPOINT_FILENAME),
            Some(source) => source.clone(),
            None => self.checkpoint_path(),
        }
    }

    /// Pick up from the resume checkpoint when resuming is enabled and the
    /// file exists; otherwise start from `begin_epoch` with the given model.
    pub fn start_state<B: Backend>(
        &self,
        model: KeypointRegressor<B>,
        device: &B::Device,
    ) -> Result<StartState<B>, TrainingError> {
        let fresh = |model| StartState {
            begin_epoch: self.config.train.begin_epoch,
            best_perf: f64::INFINITY,
            model,
        };

        if !self.config.train.resume {
            return Ok(fresh(model));
        }
        let path = self.resume_path();
        if !path.is_file() {
            tracing::warn!(
                "=> no checkpoint found at '{}', training from scratch",
                path.display()
            );
            return Ok(fresh(model));
        }

        let checkpoint = load_checkpoint::<B, _>(&path, model.clone(), device)?;
        let begin_epoch = checkpoint
            .get("epoch")
            .and_then(CheckpointValue::as_int)
            .map(|e| e.max(0) as usize)
            .unwrap_or(self.config.train.begin_epoch);
        let best_perf = checkpoint
            .get("best_perf")
            .and_then(CheckpointValue::as_float)
            .unwrap_or(f64::INFINITY);
        let model = checkpoint.into_state_dict().unwrap_or(model);

        tracing::info!(
            "=> loaded checkpoint '{}' (epoch {})",
            path.display(),
            begin_epoch
        );
        Ok(StartState {
            begin_epoch,
            best_perf,
            model,
        })
    }

    /// Train from `start` until `train.end_epoch`, checkpointing every epoch.
    pub fn fit<B: AutodiffBackend>(
        &self,
        start: StartState<B>,
        optimizer: &mut TrainOptimizer<KeypointRegressor<B>, B>,
        train_data: &SyntheticKeypoints,
        valid_data: &SyntheticKeypoints,
        device: &B::Device,
    ) -> Result<(KeypointRegressor<B>, FitSummary), TrainingError> {
        if train_data.is_empty() || valid_data.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }

        let (name, _) = model_name(&self.config.model);
        let end_epoch = self.config.train.end_epoch;
        let mut model = start.model;
        let mut best_perf = start.best_perf;
        let mut best_epoch = None;
        let mut last_valid_loss = f64::NAN;
        let mut epochs_run = 0;

        for epoch in start.begin_epoch..end_epoch {
            let (trained, train_loss) =
                self.train_epoch(model, optimizer, train_data, epoch, device);
            model = trained;

            let valid_loss = self.validate(&model, valid_data, device);
            let is_best = valid_loss < best_perf;
            if is_best {
                best_perf = valid_loss;
                best_epoch = Some(epoch);
            }
            tracing::info!(
                "Epoch [{}] train_loss {:.5} valid_loss {:.5} best {:.5}",
                epoch,
                train_loss,
                valid_loss,
                best_perf
            );

            self.metrics.log(&EpochMetrics {
                epoch,
                train_loss,
                valid_loss,
                lr: optimizer.lr(),
                is_best,
            })?;

            let states = Checkpoint::new()
                .with_entry("epoch", epoch + 1)
                .with_entry("model", name.as_str())
                .with_entry("perf", valid_loss)
                .with_entry("best_perf", best_perf)
                .with_entry("lr", optimizer.lr())
                .with_state_dict(model.clone());
            tracing::info!("=> saving checkpoint to {}", self.output_dir.display());
            save_checkpoint::<B, _>(&states, is_best, &self.output_dir, CHECKPOINT_FILENAME)?;

            last_valid_loss = valid_loss;
            epochs_run += 1;
        }

        let final_path = self.output_dir.join(FINAL_STATE_FILENAME);
        tracing::info!("=> saving final model state to {}", final_path.display());
        save_state_dict::<B, _>(&model, &final_path)?;

        Ok((
            model,
            FitSummary {
                epochs_run,
                best_perf,
                best_epoch,
                last_valid_loss,
            },
        ))
    }

    fn train_epoch<B: AutodiffBackend>(
        &self,
        mut model: KeypointRegressor<B>,
        optimizer: &mut TrainOptimizer<KeypointRegressor<B>, B>,
        data: &SyntheticKeypoints,
        epoch: usize,
        device: &B::Device,
    ) -> (KeypointRegressor<B>, f64) {
        let batch_size = self.config.train.batch_size;
        let num_batches = data.num_batches(batch_size);
        let loss_fn = MseLoss::new();
        let mut loss_sum = 0.0f64;

        for (i, start) in (0..data.len()).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(data.len());
            let (inputs, targets) = data.batch::<B>(start, end, device);

            let loss = loss_fn.forward(model.forward(inputs), targets, Reduction::Mean);
            let loss_val = loss.clone().into_scalar().elem::<f64>();
            loss_sum += loss_val;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(model, grads);

            if i % self.config.train.print_freq == 0 {
                tracing::info!(
                    "Epoch: [{}][{}/{}] Loss {:.5}",
                    epoch,
                    i,
                    num_batches,
                    loss_val
                );
            }
        }

        (model, loss_sum / num_batches as f64)
    }

    /// Mean batch loss on the inner backend; no gradients are tracked.
    fn validate<B: AutodiffBackend>(
        &self,
        model: &KeypointRegressor<B>,
        data: &SyntheticKeypoints,
        device: &B::Device,
    ) -> f64 {
        let model_valid = model.valid();
        let batch_size = self.config.train.batch_size;
        let loss_fn = MseLoss::new();
        let mut loss_sum = 0.0f64;

        for start in (0..data.len()).step_by(batch_size) {
            let end = (start + batch_size).min(data.len());
            let (inputs, targets) = data.batch::<B::InnerBackend>(start, end, device);
            let loss = loss_fn.forward(model_valid.forward(inputs), targets, Reduction::Mean);
            loss_sum += loss.into_scalar().elem::<f64>();
        }

        loss_sum / data.num_batches(batch_size) as f64
    }
}

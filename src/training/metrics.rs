use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::TrainingError;

const HEADER: &str = "epoch,train_loss,valid_loss,lr,is_best";

/// One row of the per-epoch metrics file.
#[derive(Debug, Clone)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub valid_loss: f64,
    pub lr: f64,
    pub is_best: bool,
}

/// Appends epoch metrics to `<dir>/metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only when the file is new, so resumed runs append.
    pub fn new(dir: &Path) -> Result<Self, TrainingError> {
        let csv_path = dir.join("metrics.csv");
        let io_err = |e| TrainingError::Metrics {
            path: csv_path.clone(),
            source: e,
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path).map_err(io_err)?;
            writeln!(f, "{HEADER}").map_err(io_err)?;
        }

        Ok(MetricsLogger { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<(), TrainingError> {
        let io_err = |e| TrainingError::Metrics {
            path: self.csv_path.clone(),
            source: e,
        };
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(io_err)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{},{}",
            m.epoch, m.train_loss, m.valid_loss, m.lr, m.is_best
        )
        .map_err(io_err)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

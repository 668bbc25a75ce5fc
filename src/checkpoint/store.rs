use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};

use crate::checkpoint::state::{Checkpoint, CheckpointRecord};
use crate::error::CheckpointError;

/// Default checkpoint file name.
pub const CHECKPOINT_FILENAME: &str = "checkpoint.pth.tar";
/// File receiving the state dict of the best epoch so far.
pub const BEST_MODEL_FILENAME: &str = "model_best.pth.tar";

fn recorder() -> NamedMpkBytesRecorder<FullPrecisionSettings> {
    NamedMpkBytesRecorder::default()
}

/// Write `states` to `output_dir/filename`. When `is_best` is set and the
/// checkpoint carries a state dict, that state dict alone is also written to
/// `output_dir/model_best.pth.tar`.
pub fn save_checkpoint<B, M>(
    states: &Checkpoint<M>,
    is_best: bool,
    output_dir: &Path,
    filename: &str,
) -> Result<PathBuf, CheckpointError>
where
    B: Backend,
    M: Module<B>,
{
    let path = output_dir.join(filename);
    let bytes = Recorder::<B>::record(&recorder(), states.to_record::<B>(), ())
        .map_err(|e| CheckpointError::Serialize(e.to_string()))?;
    fs::write(&path, bytes)?;
    tracing::debug!("saved checkpoint to {}", path.display());

    if is_best {
        if let Some(model) = states.state_dict() {
            let best_path = output_dir.join(BEST_MODEL_FILENAME);
            save_state_dict::<B, M>(model, &best_path)?;
            tracing::debug!("saved best model to {}", best_path.display());
        }
    }

    Ok(path)
}

/// Serialize one model's parameters to `path`.
pub fn save_state_dict<B, M>(model: &M, path: &Path) -> Result<(), CheckpointError>
where
    B: Backend,
    M: Module<B>,
{
    let bytes = Recorder::<B>::record(&recorder(), model.clone().into_record(), ())
        .map_err(|e| CheckpointError::Serialize(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Read a checkpoint written by [`save_checkpoint`]. A stored state dict is
/// loaded into `template`; `template` is dropped when there is none.
pub fn load_checkpoint<B, M>(
    path: &Path,
    template: M,
    device: &B::Device,
) -> Result<Checkpoint<M>, CheckpointError>
where
    B: Backend,
    M: Module<B>,
{
    let bytes = read_file(path)?;
    let record: CheckpointRecord<B, M::Record> = Recorder::<B>::load(&recorder(), bytes, device)
        .map_err(|e| CheckpointError::Deserialize {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let state_dict = record.state_dict.map(|r| template.load_record(r));
    Ok(Checkpoint::from_parts(record.entries, state_dict))
}

/// Load the state dict saved by [`save_state_dict`] into `template`.
pub fn load_state_dict<B, M>(path: &Path, template: M, device: &B::Device) -> Result<M, CheckpointError>
where
    B: Backend,
    M: Module<B>,
{
    let bytes = read_file(path)?;
    let record: M::Record = Recorder::<B>::load(&recorder(), bytes, device).map_err(|e| {
        CheckpointError::Deserialize {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    Ok(template.load_record(record))
}

/// Load `output_dir/model_best.pth.tar` into `template`.
pub fn load_best_model<B, M>(
    output_dir: &Path,
    template: M,
    device: &B::Device,
) -> Result<M, CheckpointError>
where
    B: Backend,
    M: Module<B>,
{
    load_state_dict::<B, M>(&output_dir.join(BEST_MODEL_FILENAME), template, device)
}

fn read_file(path: &Path) -> Result<Vec<u8>, CheckpointError> {
    if !path.exists() {
        return Err(CheckpointError::MissingFile(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

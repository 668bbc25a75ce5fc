use std::path::PathBuf;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Errors that can occur while preparing an experiment directory and logger.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config path {0} has no file name")]
    ConfigFileName(PathBuf),

    #[error("failed to copy config {from} to {to}: {source}")]
    CopyConfig {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint file not found: {0}")]
    MissingFile(PathBuf),

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(String),

    #[error("failed to deserialize checkpoint {path}: {reason}")]
    Deserialize { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during training.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("unknown optimizer '{0}' (expected 'sgd' or 'adam')")]
    UnknownOptimizer(String),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("failed to write metrics to {path}: {source}")]
    Metrics {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("invalid training config: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_error_display() {
        let err = CheckpointError::MissingFile(PathBuf::from("out/checkpoint.pth.tar"));
        assert_eq!(
            err.to_string(),
            "checkpoint file not found: out/checkpoint.pth.tar"
        );
    }

    #[test]
    fn test_training_error_display() {
        let err = TrainingError::UnknownOptimizer("rmsprop".to_string());
        assert_eq!(
            err.to_string(),
            "unknown optimizer 'rmsprop' (expected 'sgd' or 'adam')"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("train.lr must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "config validation error: train.lr must be > 0"
        );
    }

    #[test]
    fn test_experiment_error_display() {
        let err = ExperimentError::ConfigFileName(PathBuf::from("/"));
        assert_eq!(err.to_string(), "config path / has no file name");
    }

    #[test]
    fn test_checkpoint_error_converts_into_training_error() {
        let err: TrainingError = CheckpointError::Serialize("boom".into()).into();
        assert_eq!(
            err.to_string(),
            "checkpoint error: failed to serialize checkpoint: boom"
        );
    }

    #[test]
    fn test_config_error_converts_into_training_error() {
        let err: TrainingError = ConfigError::Validation("train.print_freq must be > 0".into()).into();
        assert_eq!(
            err.to_string(),
            "invalid training config: config validation error: train.print_freq must be > 0"
        );
    }
}

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Dataset section: which dataset the run targets and how it is augmented.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub dataset: String,
    /// Empty means no hybrid joint layout.
    pub hybrid_joints_type: String,
    pub rot_factor: f64,
    pub train_samples: usize,
    pub valid_samples: usize,
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            dataset: "coco".to_string(),
            hybrid_joints_type: String::new(),
            rot_factor: 40.0,
            train_samples: 512,
            valid_samples: 128,
            seed: 42,
        }
    }
}

/// Architecture-specific model options.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModelExtraConfig {
    pub target_type: String,
    pub num_layers: Option<usize>,
    pub num_deconv_filters: Vec<usize>,
}

impl Default for ModelExtraConfig {
    fn default() -> Self {
        ModelExtraConfig {
            target_type: "gaussian".to_string(),
            num_layers: None,
            num_deconv_filters: vec![256, 256, 256],
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// `[width, height]` of the network input.
    pub image_size: [usize; 2],
    pub num_joints: usize,
    pub feature_dim: usize,
    pub extra: ModelExtraConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            name: "pose_resnet".to_string(),
            image_size: [192, 256],
            num_joints: 17,
            feature_dim: 64,
            extra: ModelExtraConfig::default(),
        }
    }
}

/// Optimization and schedule settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Optimizer selector: `sgd` or `adam`. Anything else yields no optimizer.
    pub optimizer: String,
    pub lr: f64,
    pub momentum: f64,
    pub wd: f64,
    pub nesterov: bool,
    pub begin_epoch: usize,
    pub end_epoch: usize,
    pub batch_size: usize,
    pub print_freq: usize,
    pub resume: bool,
    /// Run directory or checkpoint file to resume from. Defaults to the
    /// current run directory.
    pub resume_from: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            optimizer: "adam".to_string(),
            lr: 1e-3,
            momentum: 0.9,
            wd: 1e-4,
            nesterov: false,
            begin_epoch: 0,
            end_epoch: 140,
            batch_size: 32,
            print_freq: 100,
            resume: false,
            resume_from: None,
        }
    }
}

/// Top-level experiment configuration, loadable from TOML.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub output_dir: PathBuf,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub train: TrainConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            output_dir: PathBuf::from("output"),
            dataset: DatasetConfig::default(),
            model: ModelConfig::default(),
            train: TrainConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ExperimentConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset.dataset.is_empty() {
            return Err(ConfigError::Validation(
                "dataset.dataset must not be empty".into(),
            ));
        }
        if self.model.name.is_empty() {
            return Err(ConfigError::Validation(
                "model.name must not be empty".into(),
            ));
        }
        if self.model.image_size.iter().any(|&d| d == 0) {
            return Err(ConfigError::Validation(
                "model.image_size dimensions must be > 0".into(),
            ));
        }
        if self.model.num_joints == 0 {
            return Err(ConfigError::Validation(
                "model.num_joints must be > 0".into(),
            ));
        }
        if self.model.feature_dim == 0 {
            return Err(ConfigError::Validation(
                "model.feature_dim must be > 0".into(),
            ));
        }

        let train = &self.train;
        if train.lr <= 0.0 {
            return Err(ConfigError::Validation("train.lr must be > 0".into()));
        }
        if !(0.0..1.0).contains(&train.momentum) {
            return Err(ConfigError::Validation(
                "train.momentum must be in [0, 1)".into(),
            ));
        }
        if train.wd < 0.0 {
            return Err(ConfigError::Validation("train.wd must be >= 0".into()));
        }
        if train.nesterov && train.momentum == 0.0 {
            return Err(ConfigError::Validation(
                "train.nesterov requires train.momentum > 0".into(),
            ));
        }
        if train.end_epoch <= train.begin_epoch {
            return Err(ConfigError::Validation(
                "train.end_epoch must be > train.begin_epoch".into(),
            ));
        }
        if train.batch_size == 0 {
            return Err(ConfigError::Validation(
                "train.batch_size must be > 0".into(),
            ));
        }
        if train.print_freq == 0 {
            return Err(ConfigError::Validation(
                "train.print_freq must be > 0".into(),
            ));
        }
        if train.resume_from.is_some() && !train.resume {
            return Err(ConfigError::Validation(
                "train.resume_from requires train.resume".into(),
            ));
        }

        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&ExperimentConfig::default()).expect("default config serializes")
    }
}

//! Experiment directory and logger setup.
//!
//! A run lives at `<output_dir>/<dataset>/<run_name>/` and holds a copy of the
//! config file, the text log `log_<phase>_<time>.log` and a `log/` directory for
//! per-epoch metrics.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing::Dispatch;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{DatasetConfig, ExperimentConfig, ModelConfig};
use crate::error::ExperimentError;

/// Name of the per-run directory that receives metrics.
pub const RUN_METRICS_DIR: &str = "log";

const RUN_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M";
const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Handle returned by [`create_logger`].
pub struct ExperimentLogger {
    /// Subscriber writing to both the run log file and stderr.
    pub dispatch: Dispatch,
    pub run_name: String,
    pub final_output_dir: PathBuf,
    pub tensorboard_log_dir: PathBuf,
    pub log_file: PathBuf,
    /// False when another subscriber was already the process-wide default.
    pub installed_globally: bool,
}

/// Dataset directory name, e.g. `coco` or `mpii_coco_mpii`.
pub fn dataset_dir_name(dataset: &DatasetConfig) -> String {
    let name = if dataset.hybrid_joints_type.is_empty() {
        dataset.dataset.clone()
    } else {
        format!("{}_{}", dataset.dataset, dataset.hybrid_joints_type)
    };
    name.replace(':', "_")
}

/// Returns `(name, full_name)` for the configured architecture.
///
/// With a depth configured, `pose_resnet` at 256x192 with three 256-filter
/// deconv layers gives `("pose_resnet_50", "256x192_pose_resnet_50_d256d256d256")`.
/// Without one the full name is just `<height>x<width>_<name>`.
pub fn model_name(model: &ModelConfig) -> (String, String) {
    let [width, height] = model.image_size;
    match model.extra.num_layers {
        Some(num_layers) => {
            let name = format!("{}_{}", model.name, num_layers);
            let deconv_suffix: String = model
                .extra
                .num_deconv_filters
                .iter()
                .map(|f| format!("d{f}"))
                .collect();
            let full_name = if deconv_suffix.is_empty() {
                format!("{height}x{width}_{name}")
            } else {
                format!("{height}x{width}_{name}_{deconv_suffix}")
            };
            (name, full_name)
        }
        None => (model.name.clone(), format!("{height}x{width}_{}", model.name)),
    }
}

/// Derive the run directory name from the config, a free-form flag and the
/// run timestamp. Empty strings and zero values are left out.
pub fn run_name(cfg: &ExperimentConfig, flag: &str, time_str: &str) -> String {
    let (_, full_name) = model_name(&cfg.model);
    let extra = &cfg.model.extra;

    let mut parts = vec![non_empty(&full_name)];
    // Architectures without deconv layers get the shorter name.
    if let Some(&filters) = extra.num_deconv_filters.first() {
        parts.push((filters != 0).then(|| filters.to_string()));
    }
    parts.push(non_empty(&extra.target_type));
    parts.push((cfg.dataset.rot_factor != 0.0).then(|| cfg.dataset.rot_factor.to_string()));
    parts.push(non_empty(flag));
    parts.push(non_empty(time_str));

    parts.into_iter().flatten().collect::<Vec<_>>().join("_")
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Create the run directory tree and install the file + console logger,
/// stamping the run with the current local time.
pub fn create_logger(
    cfg: &ExperimentConfig,
    cfg_path: &Path,
    flag: &str,
    phase: &str,
) -> Result<ExperimentLogger, ExperimentError> {
    create_logger_at(cfg, cfg_path, flag, phase, Local::now().naive_local())
}

/// Same as [`create_logger`] with an explicit run timestamp.
pub fn create_logger_at(
    cfg: &ExperimentConfig,
    cfg_path: &Path,
    flag: &str,
    phase: &str,
    now: NaiveDateTime,
) -> Result<ExperimentLogger, ExperimentError> {
    let time_str = now.format(RUN_TIME_FORMAT).to_string();

    let root_output_dir = &cfg.output_dir;
    if !root_output_dir.exists() {
        println!("=> creating {}", root_output_dir.display());
        create_dir(root_output_dir)?;
    }

    let run_name = run_name(cfg, flag, &time_str);
    let final_output_dir = root_output_dir
        .join(dataset_dir_name(&cfg.dataset))
        .join(&run_name);
    println!("=> creating {}", final_output_dir.display());
    create_dir(&final_output_dir)?;

    let cfg_name = cfg_path
        .file_name()
        .ok_or_else(|| ExperimentError::ConfigFileName(cfg_path.to_path_buf()))?;
    let cfg_copy = final_output_dir.join(cfg_name);
    fs::copy(cfg_path, &cfg_copy).map_err(|e| ExperimentError::CopyConfig {
        from: cfg_path.to_path_buf(),
        to: cfg_copy.clone(),
        source: e,
    })?;

    // Setups landing in the same minute share the log file; keep earlier lines.
    let log_file = final_output_dir.join(format!("log_{phase}_{time_str}.log"));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| ExperimentError::LogFile {
            path: log_file.clone(),
            source: e,
        })?;
    let dispatch = build_dispatch(file, std::io::stderr);
    let installed_globally = tracing::dispatcher::set_global_default(dispatch.clone()).is_ok();
    if !installed_globally {
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::warn!("a global logger is already installed; run log is scoped to this handle");
        });
    }

    let tensorboard_log_dir = final_output_dir.join(RUN_METRICS_DIR);
    println!("=> creating {}", tensorboard_log_dir.display());
    create_dir(&tensorboard_log_dir)?;

    Ok(ExperimentLogger {
        dispatch,
        run_name,
        final_output_dir,
        tensorboard_log_dir,
        log_file,
        installed_globally,
    })
}

fn create_dir(path: &Path) -> Result<(), ExperimentError> {
    fs::create_dir_all(path).map_err(|e| ExperimentError::CreateDir {
        path: path.to_path_buf(),
        source: e,
    })
}

/// `RUST_LOG` decides the level, `info` otherwise. The file gets
/// `<timestamp> <message>`, the console just the message.
fn build_dispatch<W>(log_file: File, console: W) -> Dispatch
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()));
    let console_layer = fmt::layer()
        .with_writer(console)
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .without_time();

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);
    Dispatch::new(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 30)
            .unwrap()
    }

    fn resnet_config() -> ExperimentConfig {
        let mut cfg = ExperimentConfig::default();
        cfg.model.extra.num_layers = Some(50);
        cfg
    }

    #[test]
    fn test_dataset_dir_name_plain() {
        let cfg = ExperimentConfig::default();
        assert_eq!(dataset_dir_name(&cfg.dataset), "coco");
    }

    #[test]
    fn test_dataset_dir_name_hybrid_replaces_colons() {
        let mut cfg = ExperimentConfig::default();
        cfg.dataset.dataset = "mpii".to_string();
        cfg.dataset.hybrid_joints_type = "coco:mpii".to_string();
        assert_eq!(dataset_dir_name(&cfg.dataset), "mpii_coco_mpii");
    }

    #[test]
    fn test_model_name_with_depth() {
        let cfg = resnet_config();
        let (name, full_name) = model_name(&cfg.model);
        assert_eq!(name, "pose_resnet_50");
        assert_eq!(full_name, "256x192_pose_resnet_50_d256d256d256");
    }

    #[test]
    fn test_model_name_without_depth() {
        let mut cfg = ExperimentConfig::default();
        cfg.model.name = "pose_hrnet".to_string();
        let (name, full_name) = model_name(&cfg.model);
        assert_eq!(name, "pose_hrnet");
        assert_eq!(full_name, "256x192_pose_hrnet");
    }

    #[test]
    fn test_model_name_depth_without_deconv() {
        let mut cfg = resnet_config();
        cfg.model.extra.num_deconv_filters.clear();
        let (_, full_name) = model_name(&cfg.model);
        assert_eq!(full_name, "256x192_pose_resnet_50");
    }

    #[test]
    fn test_run_name_full() {
        let cfg = resnet_config();
        assert_eq!(
            run_name(&cfg, "baseline", "2024-03-05-14-07"),
            "256x192_pose_resnet_50_d256d256d256_256_gaussian_40_baseline_2024-03-05-14-07"
        );
    }

    #[test]
    fn test_run_name_falls_back_without_deconv_filters() {
        let mut cfg = ExperimentConfig::default();
        cfg.model.name = "pose_hrnet".to_string();
        cfg.model.extra.num_deconv_filters.clear();
        assert_eq!(
            run_name(&cfg, "", "2024-03-05-14-07"),
            "256x192_pose_hrnet_gaussian_40_2024-03-05-14-07"
        );
    }

    #[test]
    fn test_run_name_drops_zero_and_empty_parts() {
        let mut cfg = ExperimentConfig::default();
        cfg.dataset.rot_factor = 0.0;
        cfg.model.extra.target_type.clear();
        cfg.model.extra.num_deconv_filters = vec![0];
        assert_eq!(run_name(&cfg, "", "t"), "256x192_pose_resnet_t");
    }

    #[test]
    fn test_run_name_fractional_rot_factor() {
        let mut cfg = ExperimentConfig::default();
        cfg.dataset.rot_factor = 22.5;
        assert_eq!(
            run_name(&cfg, "", "t"),
            "256x192_pose_resnet_256_gaussian_22.5_t"
        );
    }

    #[test]
    fn test_create_logger_builds_tree() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("res50_256x192.toml");
        fs::write(&cfg_path, "[train]\nlr = 0.001\n").unwrap();

        let mut cfg = resnet_config();
        cfg.output_dir = dir.path().join("output");

        let logger = create_logger_at(&cfg, &cfg_path, "", "train", fixed_time()).unwrap();

        let expected = dir
            .path()
            .join("output")
            .join("coco")
            .join("256x192_pose_resnet_50_d256d256d256_256_gaussian_40_2024-03-05-14-07");
        assert_eq!(logger.final_output_dir, expected);
        assert_eq!(logger.tensorboard_log_dir, expected.join("log"));
        assert_eq!(
            logger.log_file,
            expected.join("log_train_2024-03-05-14-07.log")
        );
        assert!(logger.tensorboard_log_dir.is_dir());
        assert!(logger.log_file.is_file());

        let copied = fs::read_to_string(expected.join("res50_256x192.toml")).unwrap();
        assert_eq!(copied, "[train]\nlr = 0.001\n");
    }

    #[test]
    fn test_create_logger_writes_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("exp.toml");
        fs::write(&cfg_path, "").unwrap();

        let mut cfg = ExperimentConfig::default();
        cfg.output_dir = dir.path().join("output");

        let logger = create_logger_at(&cfg, &cfg_path, "debug", "valid", fixed_time()).unwrap();
        tracing::dispatcher::with_default(&logger.dispatch, || {
            tracing::info!("epoch 3 finished");
        });

        let contents = fs::read_to_string(&logger.log_file).unwrap();
        assert!(contents.contains("epoch 3 finished"), "log was: {contents}");
        assert!(logger
            .log_file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("log_valid_"));
    }

    #[test]
    fn test_create_logger_reuses_existing_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("exp.toml");
        fs::write(&cfg_path, "").unwrap();

        let mut cfg = ExperimentConfig::default();
        cfg.output_dir = dir.path().join("output");

        let first = create_logger_at(&cfg, &cfg_path, "", "train", fixed_time()).unwrap();
        let second = create_logger_at(&cfg, &cfg_path, "", "train", fixed_time()).unwrap();
        assert_eq!(first.final_output_dir, second.final_output_dir);
    }

    #[test]
    fn test_create_logger_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ExperimentConfig::default();
        cfg.output_dir = dir.path().join("output");

        let err = create_logger_at(
            &cfg,
            &dir.path().join("missing.toml"),
            "",
            "train",
            fixed_time(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ExperimentError::CopyConfig { .. }), "got: {err}");
    }

    #[test]
    fn test_create_logger_same_minute_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("exp.toml");
        fs::write(&cfg_path, "").unwrap();

        let mut cfg = ExperimentConfig::default();
        cfg.output_dir = dir.path().join("output");

        let first = create_logger_at(&cfg, &cfg_path, "", "train", fixed_time()).unwrap();
        tracing::dispatcher::with_default(&first.dispatch, || {
            tracing::info!("first run line");
        });

        let later = fixed_time() + chrono::Duration::seconds(20);
        let second = create_logger_at(&cfg, &cfg_path, "", "train", later).unwrap();
        assert_eq!(first.log_file, second.log_file);
        tracing::dispatcher::with_default(&second.dispatch, || {
            tracing::info!("second run line");
        });

        let contents = fs::read_to_string(&second.log_file).unwrap();
        assert!(contents.contains("first run line"), "log was: {contents}");
        assert!(contents.contains("second run line"), "log was: {contents}");
    }

    #[test]
    fn test_console_prints_bare_message() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("run.log")).unwrap();
        let console = SharedBuf::default();
        let sink = console.clone();
        let dispatch = build_dispatch(file, move || sink.clone());

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("epoch 3 finished");
        });

        let out = String::from_utf8(console.0.lock().unwrap().clone()).unwrap();
        assert_eq!(out.trim(), "epoch 3 finished");

        let logged = fs::read_to_string(dir.path().join("run.log")).unwrap();
        assert!(logged.trim_end().ends_with("epoch 3 finished"));
        assert!(logged.starts_with("20"), "file line should carry a timestamp: {logged}");
    }

    #[test]
    fn test_create_logger_rejects_config_path_without_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ExperimentConfig::default();
        cfg.output_dir = dir.path().join("output");

        let err = create_logger_at(&cfg, Path::new(".."), "", "train", fixed_time())
            .err()
            .unwrap();
        assert!(
            matches!(err, ExperimentError::ConfigFileName(ref p) if p == Path::new("..")),
            "got: {err}"
        );
    }
}

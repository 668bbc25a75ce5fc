//! # Pose Experiment
//!
//! Run bookkeeping for keypoint-model training on the Burn ML framework:
//! experiment directories and logging, optimizer selection from config, and
//! checkpoint persistence.
//!
//! ## Modules
//!
//! - [`config`] — TOML configuration loading and validation
//! - [`experiment`] — Run naming, output directory tree, file + console logger
//! - [`optim`] — SGD / Adam factory driven by the `train` section
//! - [`checkpoint`] — Checkpoint and best-model save/load
//! - [`model`] — Keypoint regression network
//! - [`training`] — Synthetic data, metrics CSV, epoch trainer
//! - [`error`] — Structured error types

#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod experiment;
pub mod model;
pub mod optim;
pub mod training;

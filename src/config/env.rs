use std::{path::PathBuf, time::Duration};

use chrono_tz::Tz;
use thiserror::Error;

use crate::model::TrainingParams;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub feeds: FeedConfig,
    pub scheduler: SchedulerConfig,
    pub training: TrainingParams,
    /// Labeled CSV used for the first fit. The bundled corpus is used when unset.
    pub seed_corpus_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
    /// Relative paths resolve against `data_dir`.
    pub model_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub phishtank_url: String,
    pub openphish_url: String,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub retrain_crons: Vec<String>,
    pub feed_refresh_crons: Vec<String>,
    pub timezone: Tz,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

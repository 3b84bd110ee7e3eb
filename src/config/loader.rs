use std::{env, path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, FeedConfig, LoggingConfig, SchedulerConfig,
};
use crate::model::TrainingParams;

pub const DEFAULT_PHISHTANK_URL: &str = "http://data.phishtank.com/data/online-valid.csv";
pub const DEFAULT_OPENPHISH_URL: &str = "https://openphish.com/feed.txt";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let directories = DirectoryConfig {
            logs_dir: or("LOGS_DIR", "logs"),
            data_dir: or("DATA_DIR", "data"),
            db_filename: or("DB_FILENAME", "phishguard.db"),
            model_dir: or("MODEL_DIR", "model"),
        };

        let logging = LoggingConfig {
            level: or("LOG_LEVEL", "info"),
        };

        let feeds = FeedConfig {
            phishtank_url: or("PHISHTANK_URL", DEFAULT_PHISHTANK_URL),
            openphish_url: or("OPENPHISH_URL", DEFAULT_OPENPHISH_URL),
            fetch_timeout: Duration::from_millis(parse("FEED_FETCH_TIMEOUT", var("FEED_FETCH_TIMEOUT"), 10_000u64)?),
        };

        let scheduler = SchedulerConfig {
            retrain_crons: cron_list(var("RETRAIN_CRONS"), "0 0 3 * * *"),
            feed_refresh_crons: cron_list(var("FEED_REFRESH_CRONS"), "0 30 2 * * *"),
            timezone: parse("SCHEDULER_TIMEZONE", var("SCHEDULER_TIMEZONE"), Tz::UTC)?,
        };

        let defaults = TrainingParams::default();
        let training = TrainingParams {
            c: parse("TRAINING_C", var("TRAINING_C"), defaults.c)?,
            max_iter: parse("TRAINING_MAX_ITER", var("TRAINING_MAX_ITER"), defaults.max_iter)?,
            tolerance: parse("TRAINING_TOLERANCE", var("TRAINING_TOLERANCE"), defaults.tolerance)?,
        };
        let valid = training.c > 0.0 && training.tolerance > 0.0 && training.max_iter > 0;
        if !valid {
            return Err(ConfigError::Invalid {
                key: "TRAINING_*",
                value: format!("{training:?}"),
            });
        }

        Ok(Self {
            directories,
            logging,
            feeds,
            scheduler,
            training,
            seed_corpus_path: var("SEED_CORPUS_PATH").map(PathBuf::from),
        })
    }
}

fn parse<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// `;`-separated cron expressions.
fn cron_list(raw: Option<String>, default: &str) -> Vec<String> {
    raw.map(|value| {
        value
            .split(';')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
    })
    .unwrap_or_else(|| vec![default.to_string()])
}

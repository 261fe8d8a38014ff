//! Runtime settings
//!
//! Every field has a default and can be overridden from the environment.

use std::path::PathBuf;

/// Minimum labeled rows a training submission needs
pub const MIN_TRAINING_RECORDS: usize = 1000;

/// Default experiment label for training runs
pub const DEFAULT_EXPERIMENT: &str = "respiratory_mortality_prediction";

/// Engine and server settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Root of the filesystem artifact store
    pub models_dir: PathBuf,
    /// Where the local experiment tracker writes runs
    pub tracking_dir: PathBuf,
    /// Training worker pool size
    pub workers: usize,
    pub min_training_records: usize,
    /// Upper bound on rows loaded for one training job
    pub max_training_records: usize,
    pub retention_days: i64,
    pub keep_best: usize,
    pub experiment_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("API_PORT").unwrap_or(8000),
            models_dir: std::env::var("MODEL_REGISTRY_URI")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
            tracking_dir: std::env::var("TRACKING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./experiments")),
            workers: env_parse("TRAINING_WORKERS").unwrap_or(2).max(1),
            min_training_records: env_parse("MIN_TRAINING_RECORDS").unwrap_or(MIN_TRAINING_RECORDS),
            max_training_records: env_parse("MAX_TRAINING_RECORDS").unwrap_or(1_000_000),
            retention_days: env_parse("RETENTION_DAYS").unwrap_or(30),
            keep_best: env_parse("KEEP_BEST").unwrap_or(3),
            experiment_name: std::env::var("EXPERIMENT_NAME")
                .unwrap_or_else(|_| DEFAULT_EXPERIMENT.to_string()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

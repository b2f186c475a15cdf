//! Environment-driven configuration for the whole transcriber.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use db::{DbConfig, ResultStoreConfig};
use storage::{StorageConfig, StorageError};
use transcriber_core::PoolConfig;

use crate::admission::AdmissionPolicy;

const DEFAULT_RESULT_DIR: &str = "./data/archive";
const DEFAULT_WORK_DIR: &str = "./data/work";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var}={value}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How the recognizer is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub command: String,
    pub args: Vec<String>,
    /// ffmpeg binary for converting uploads to WAV. `None` skips conversion.
    pub ffmpeg: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Parent of the per-job scratch directories.
    pub work_dir: PathBuf,
}

impl PipelineConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            ffmpeg: None,
            timeout: None,
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pool: PoolConfig,
    pub admission: AdmissionPolicy,
    pub result_store: ResultStoreConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|var| std::env::var(var).ok())?;
        config.storage = StorageConfig::from_env()?;
        Ok(config)
    }

    /// Build a configuration from any variable source.
    ///
    /// Upload storage is left in memory here; [`AppConfig::from_env`] reads
    /// it from the `STORAGE_*` variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut pool = PoolConfig::default();
        if let Some(workers) = parse::<u32>("TRANSCRIBER_WORKERS", get("TRANSCRIBER_WORKERS"))? {
            if workers == 0 {
                return Err(invalid("TRANSCRIBER_WORKERS", "0", "at least one worker is needed"));
            }
            pool = pool.with_workers(workers);
        }
        if let Some(max_pending) = parse::<usize>("MAX_PENDING_JOBS", get("MAX_PENDING_JOBS"))? {
            pool = pool.with_max_pending(max_pending);
        }

        let mut admission = AdmissionPolicy::default();
        if let Some(max_bytes) = parse::<usize>("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"))? {
            admission = admission.with_max_bytes(max_bytes);
        }
        if let Some(extensions) = get("ALLOWED_EXTENSIONS") {
            admission = admission.with_extensions(extensions.split(','));
            if admission.allowed_extensions.is_empty() {
                return Err(invalid("ALLOWED_EXTENSIONS", &extensions, "no extensions listed"));
            }
        }

        let result_store = match get("RESULT_STORE").as_deref() {
            None | Some("database") | Some("db") => {
                let mut db = match get("DB_ENDPOINT") {
                    Some(endpoint) => DbConfig::endpoint(endpoint),
                    None => DbConfig::memory(),
                };
                if let Some(namespace) = get("DB_NAMESPACE") {
                    db = db.with_namespace(namespace);
                }
                if let Some(database) = get("DB_DATABASE") {
                    db = db.with_database(database);
                }
                match (get("DB_USERNAME"), get("DB_PASSWORD")) {
                    (Some(username), Some(password)) => db = db.with_credentials(username, password),
                    (None, None) => {}
                    (Some(_), None) => return Err(ConfigError::Missing("DB_PASSWORD")),
                    (None, Some(_)) => return Err(ConfigError::Missing("DB_USERNAME")),
                }
                ResultStoreConfig::Database(db)
            }
            Some("filesystem") | Some("fs") => ResultStoreConfig::Filesystem {
                root: get("RESULT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULT_DIR)),
            },
            Some(other) => {
                return Err(invalid("RESULT_STORE", other, "expected database|filesystem"));
            }
        };

        let mut pipeline = PipelineConfig::new(get("PIPELINE_COMMAND").ok_or(ConfigError::Missing("PIPELINE_COMMAND"))?);
        if let Some(args) = get("PIPELINE_ARGS") {
            pipeline.args = args.split_whitespace().map(str::to_string).collect();
        }
        pipeline.ffmpeg = get("FFMPEG_PATH").map(PathBuf::from);
        pipeline.timeout = parse::<u64>("PIPELINE_TIMEOUT_SECS", get("PIPELINE_TIMEOUT_SECS"))?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        if let Some(work_dir) = get("PIPELINE_WORK_DIR") {
            pipeline.work_dir = PathBuf::from(work_dir);
        }

        Ok(Self {
            pool,
            admission,
            result_store,
            storage: StorageConfig::memory(),
            pipeline,
        })
    }
}

fn parse<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|value| value.parse::<T>().map_err(|e| invalid(var, &value, e)))
        .transpose()
}

fn invalid(var: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

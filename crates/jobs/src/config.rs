//! Job system configuration, read from the environment.

use std::str::FromStr;
use std::sync::Arc;

use comicshelf_observability::LogFormat;

use crate::jobs::postgres::PostgresJobStore;
use crate::jobs::store::{InMemoryJobStore, JobStore, JobStoreError};
use crate::jobs::worker::WorkerConfig;

pub const WORKER_NAME_VAR: &str = "COMICSHELF_WORKER_NAME";
pub const JOB_STORE_VAR: &str = "COMICSHELF_JOB_STORE";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const RECOVER_ON_START_VAR: &str = "COMICSHELF_RECOVER_ON_START";
pub const LOG_FORMAT_VAR: &str = "COMICSHELF_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set when COMICSHELF_JOB_STORE=postgres")]
    Missing(&'static str),
}

/// Where job records are kept between submission and decode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres { database_url: String },
}

impl StoreBackend {
    /// Open the configured store. Postgres connects and creates the jobs table, so this
    /// runs on the runtime the store will block on afterwards.
    pub async fn open(&self) -> Result<Arc<dyn JobStore>, JobStoreError> {
        match self {
            StoreBackend::Memory => Ok(InMemoryJobStore::arc()),
            StoreBackend::Postgres { database_url } => {
                Ok(Arc::new(PostgresJobStore::connect(database_url).await?))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSystemConfig {
    pub worker_name: String,
    pub store: StoreBackend,
    /// Run the recovery sweep before the worker starts.
    pub recover_on_start: bool,
    pub log_format: LogFormat,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        Self {
            worker_name: WorkerConfig::default().name,
            store: StoreBackend::Memory,
            recover_on_start: true,
            log_format: LogFormat::Json,
        }
    }
}

impl JobSystemConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or empty variables take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let worker_name = get(WORKER_NAME_VAR).unwrap_or(defaults.worker_name);

        let store = match get(JOB_STORE_VAR).as_deref().map(str::trim) {
            None | Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres {
                database_url: get(DATABASE_URL_VAR)
                    .ok_or(ConfigError::Missing(DATABASE_URL_VAR))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: JOB_STORE_VAR,
                    value: other.to_string(),
                    reason: "expected `memory` or `postgres`".to_string(),
                });
            }
        };

        let recover_on_start = match get(RECOVER_ON_START_VAR) {
            Some(raw) => parse_var(RECOVER_ON_START_VAR, &raw)?,
            None => defaults.recover_on_start,
        };

        let log_format = match get(LOG_FORMAT_VAR) {
            Some(raw) => parse_var(LOG_FORMAT_VAR, &raw)?,
            None => defaults.log_format,
        };

        Ok(Self {
            worker_name,
            store,
            recover_on_start,
            log_format,
        })
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    pub fn with_recover_on_start(mut self, recover: bool) -> Self {
        self.recover_on_start = recover;
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Install the process-wide tracing subscriber in the configured format.
    pub fn init_logging(&self) {
        comicshelf_observability::init_with(self.log_format);
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default().with_name(&self.worker_name)
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

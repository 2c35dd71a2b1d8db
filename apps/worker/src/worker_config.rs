use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tenure_application::{AbdicationPolicy, WorkerSettings};
use tenure_core::{AppError, AppResult};
use tenure_domain::{TaskAssignment, TaskKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseBackendConfig {
    Filesystem { path_prefix: PathBuf },
    Redis { url: String, key_prefix: String },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSourceConfig {
    Http { url: String },
    File { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub task_key: String,
    pub composite: bool,
    pub worker_id: String,
    pub lease_backend: LeaseBackendConfig,
    pub catalog_source: CatalogSourceConfig,
    pub executor_url: String,
    pub executor_max_attempts: u8,
    pub settings: WorkerSettings,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvVars { lookup };

        let task_key = vars.required("TENURE_TASK_KEY")?;
        let composite = vars.parse_bool("TENURE_TASK_COMPOSITE", false)?;
        let worker_id = vars
            .optional("TENURE_WORKER_ID")
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));

        let lease_backend = match vars
            .optional("TENURE_LOCK_BACKEND")
            .unwrap_or_else(|| "filesystem".to_owned())
            .as_str()
        {
            "filesystem" => LeaseBackendConfig::Filesystem {
                path_prefix: PathBuf::from(
                    vars.optional("TENURE_LOCK_PATH")
                        .unwrap_or_else(|| "/tmp/tenure.lock".to_owned()),
                ),
            },
            "redis" => LeaseBackendConfig::Redis {
                url: vars
                    .optional("TENURE_REDIS_URL")
                    .unwrap_or_else(|| "redis://127.0.0.1:6379".to_owned()),
                key_prefix: vars
                    .optional("TENURE_REDIS_KEY_PREFIX")
                    .unwrap_or_else(|| "tenure:lease".to_owned()),
            },
            "memory" => LeaseBackendConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "TENURE_LOCK_BACKEND must be filesystem, redis or memory, got '{other}'"
                )));
            }
        };

        let catalog_source = match (
            vars.optional("TENURE_CATALOG_URL"),
            vars.optional("TENURE_CATALOG_FILE"),
        ) {
            (Some(url), None) => CatalogSourceConfig::Http {
                url: url.trim_end_matches('/').to_owned(),
            },
            (None, Some(path)) => CatalogSourceConfig::File {
                path: PathBuf::from(path),
            },
            _ => {
                return Err(AppError::Validation(
                    "exactly one of TENURE_CATALOG_URL or TENURE_CATALOG_FILE is required"
                        .to_owned(),
                ));
            }
        };

        let executor_url = vars.required("TENURE_EXECUTOR_URL")?;
        let executor_max_attempts = vars.parse_u8("TENURE_EXECUTOR_MAX_ATTEMPTS", 3)?;

        let abdication_policy = AbdicationPolicy::parse(
            vars.optional("TENURE_ABDICATION_POLICY")
                .unwrap_or_else(|| AbdicationPolicy::default().as_str().to_owned())
                .as_str(),
        )?;

        let settings = WorkerSettings {
            acquire_timeout: Duration::from_secs(
                vars.parse_u64("TENURE_LOCK_TIMEOUT_SECONDS", 2)?,
            ),
            expiration_tolerance: Duration::from_secs(
                vars.parse_u64("TENURE_LOCK_EXPIRATION_SECONDS", 30)?,
            ),
            max_ttl: Duration::from_secs(vars.parse_u64("TENURE_MAX_TTL_SECONDS", 600)?),
            poll_interval: Duration::from_millis(
                vars.parse_u64("TENURE_POLL_INTERVAL_MS", 100)?,
            ),
            abdication_policy,
            destination: vars.required("TENURE_DESTINATION")?,
            encrypt: vars.parse_bool("TENURE_ENCRYPT", false)?,
            not_modified_tolerance: Duration::from_secs(
                vars.parse_u64("TENURE_NOT_MODIFIED_TOLERANCE_SECONDS", 8)?,
            ),
        };
        settings.validate()?;

        Ok(Self {
            task_key,
            composite,
            worker_id,
            lease_backend,
            catalog_source,
            executor_url,
            executor_max_attempts,
            settings,
        })
    }

    pub fn assignment(&self) -> AppResult<TaskAssignment> {
        let key = TaskKey::new(self.task_key.as_str())?;
        Ok(if self.composite {
            TaskAssignment::composite(key)
        } else {
            TaskAssignment::primitive(key)
        })
    }
}

struct EnvVars<F> {
    lookup: F,
}

impl<F> EnvVars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn parse_u64(&self, name: &str, default: u64) -> AppResult<u64> {
        match self.optional(name) {
            Some(value) => value.parse::<u64>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }

    fn parse_u8(&self, name: &str, default: u8) -> AppResult<u8> {
        match self.optional(name) {
            Some(value) => value.parse::<u8>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }

    fn parse_bool(&self, name: &str, default: bool) -> AppResult<bool> {
        match self.optional(name) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(AppError::Validation(format!(
                    "invalid {name} value '{value}': expected true or false"
                ))),
            },
            None => Ok(default),
        }
    }
}

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_more::derive::From;
use ewe_channels::Capacity;
use serde::{Deserialize, Serialize};

use crate::synca::CounterStrategy;

/// Environment variable overriding [`SchedulerConfig::max_workers`].
pub const MAX_WORKERS_ENV: &str = "EWE_TASKS_MAX_WORKERS";

#[derive(Debug, From)]
pub enum ConfigError {
    #[from(ignore)]
    IOError(std::io::Error),

    #[from(ignore)]
    DeserializationFailed(toml::de::Error),

    InvalidPath(PathBuf),

    #[from(ignore)]
    InvalidEnvValue { name: &'static str, value: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::DeserializationFailed(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Controls how a [`crate::scheduler::Scheduler`] executes its tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on worker threads. `None` runs every task on its
    /// own thread.
    pub max_workers: Option<usize>,

    /// How long a run may take before it is cancelled, in milliseconds.
    pub deadline_ms: Option<u64>,
}

impl SchedulerConfig {
    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Channel buffer size, 0 makes producer and consumer rendezvous.
    pub capacity: usize,

    pub consumers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            consumers: 1,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn capacity(&self) -> Capacity {
        Capacity::from(self.capacity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub strategy: CounterStrategy,
    pub workers: usize,
    pub increments: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            strategy: CounterStrategy::Lock,
            workers: 10,
            increments: 1000,
        }
    }
}

/// `EngineConfig` gathers the tunables of every engine component, it is
/// usually loaded from a TOML file:
///
/// ```toml
/// [scheduler]
/// max_workers = 4
/// deadline_ms = 5000
///
/// [pipeline]
/// capacity = 10
/// consumers = 2
///
/// [counter]
/// strategy = "atomic"
/// workers = 10
/// increments = 1000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
    pub counter: CounterConfig,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn from_path<V: Into<PathBuf>>(target: V) -> ConfigResult<Self> {
        let target_path = target.into();
        if !target_path.is_file() {
            return Err(ConfigError::InvalidPath(target_path));
        }

        let config_content = std::fs::read_to_string(target_path)?;
        Self::from_toml_str(&config_content)
    }

    /// with_env_overrides applies [`MAX_WORKERS_ENV`] when set, it must
    /// hold a positive integer.
    pub fn with_env_overrides(mut self) -> ConfigResult<Self> {
        if let Ok(value) = env::var(MAX_WORKERS_ENV) {
            match usize::from_str(value.trim()) {
                Ok(workers @ 1..) => {
                    tracing::debug!("Using {} workers from {}", workers, MAX_WORKERS_ENV);
                    self.scheduler.max_workers = Some(workers);
                }
                _ => {
                    return Err(ConfigError::InvalidEnvValue {
                        name: MAX_WORKERS_ENV,
                        value,
                    })
                }
            }
        }
        Ok(self)
    }
}

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::model::function_config::DefaultOverlay;

pub fn compose_config<'de, CFG: Deserialize<'de>>(external_path: &str, env_prefix: &str) -> Result<CFG, ConfigError> {
    Config::builder()

        // Add in a local configuration file
        .add_source(File::with_name(external_path).required(false))

        // Add in settings from the environment (KFN_WORKERS, KFN_DEFAULTS__CONSUMER__...)
        .add_source(Environment::with_prefix(env_prefix).prefix_separator("_").separator("__"))

        .build()?
        .try_deserialize()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default)]
    pub defaults: DefaultOverrides,
    #[serde(default = "default_workers")]
    pub workers: u16,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_metrics_address")]
    pub metrics_address: SocketAddr,
    #[serde(default = "default_resync_period_secs")]
    pub resync_period_secs: u64,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Startup-provided overrides, one map per property namespace.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultOverrides {
    #[serde(default)]
    pub function: BTreeMap<String, String>,
    #[serde(default)]
    pub consumer: BTreeMap<String, String>,
    #[serde(default)]
    pub producer: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            defaults: DefaultOverrides::default(),
            workers: default_workers(),
            namespace: None,
            metrics_address: default_metrics_address(),
            resync_period_secs: default_resync_period_secs(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Snapshot of the values every reconciliation layers under the Function's own settings.
    pub fn default_overlay(&self) -> DefaultOverlay {
        DefaultOverlay {
            bootstrap_servers: self.bootstrap_servers.clone(),
            function: self.defaults.function.clone(),
            consumer: self.defaults.consumer.clone(),
            producer: self.defaults.producer.clone(),
        }
    }

    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }

    /// Checked once file, environment and command line layers have been merged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Message(String::from("workers must be at least 1")));
        }
        if self.resync_period_secs == 0 {
            return Err(ConfigError::Message(String::from("resync_period_secs must be at least 1")));
        }
        if self.backoff.base_delay_ms == 0 {
            return Err(ConfigError::Message(String::from("backoff.base_delay_ms must be at least 1")));
        }
        if self.backoff.max_delay() < self.backoff.base_delay() {
            return Err(ConfigError::Message(String::from("backoff.max_delay_secs is shorter than backoff.base_delay_ms")));
        }
        Ok(())
    }
}

/// Parses a `key:value` command line pair. Values containing a further `:` are rejected.
pub fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split(':').collect::<Vec<_>>().as_slice() {
        [key, value] => Ok((String::from(*key), String::from(*value))),
        _ => Err(format!("'{value}' is not a key:value pair")),
    }
}

fn default_bootstrap_servers() -> String {
    String::from("kafka-headless:9092")
}

fn default_workers() -> u16 {
    2
}

fn default_metrics_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}

fn default_resync_period_secs() -> u64 {
    30
}

fn default_base_delay_ms() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    1000
}

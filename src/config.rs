//! Runtime settings: `pathbit.toml` (optional) overridden by `PATHBIT_*` environment variables

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAP_SIZE, DEFAULT_MAX_READERS};
use crate::error::{PathbitError, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// LMDB environment location and limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_map_size")]
    pub map_size: usize,
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/pathbit")
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

fn default_max_readers() -> u32 {
    DEFAULT_MAX_READERS
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: default_store_path(),
            map_size: default_map_size(),
            max_readers: default_max_readers(),
        }
    }
}

impl StoreConfig {
    /// Default limits at an explicit location
    pub fn at(path: &Path) -> Self {
        StoreConfig { path: path.to_path_buf(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { host: default_host(), port: default_port() }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_filter() -> String {
    "info,pathbit=debug".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { filter: default_filter(), format: LogFormat::default() }
    }
}

impl Settings {
    /// Load `pathbit.toml` from the working directory if present, then apply the environment.
    /// Example: `PATHBIT_STORE__PATH=/var/lib/pathbit`
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("pathbit").required(false))
            .add_source(
                Environment::with_prefix("PATHBIT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PathbitError::Config(e.to_string()))?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        config.try_deserialize().map_err(|e| PathbitError::Config(e.to_string()))
    }
}

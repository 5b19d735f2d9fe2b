//! Typed configuration loading and normalization.
//!
//! The pulling strategy may be configured either as a named preset or as an
//! explicit weight map over the two selectable sources. Both forms are
//! resolved once at load time into percent weights summing to 100; the rest
//! of the engine only ever sees the normalized form.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::types::Source;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown strategy preset: {0}")]
    UnknownPreset(String),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Raw strategy as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StrategyConfig {
    /// A named preset: `"default"`, `"newFilesFirst"` or `"preferExisting"`.
    Preset(String),
    /// Explicit weights, normalized to percentages at load time.
    Weights(RawWeights),
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawWeights {
    #[serde(default)]
    pub new_files: f64,
    #[serde(default)]
    pub existing_files: f64,
}

/// Percent weights over the selectable sources, summing to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyWeights {
    /// Weight of the `chainEvent` source (fresh on-chain orders).
    pub new_files: f64,
    /// Weight of the `dbScan` source (files already known to the fleet).
    pub existing_files: f64,
}

const DEFAULT_WEIGHTS: StrategyWeights = StrategyWeights { new_files: 60.0, existing_files: 40.0 };
const NEW_FILES_FIRST_WEIGHTS: StrategyWeights =
    StrategyWeights { new_files: 80.0, existing_files: 20.0 };
const PREFER_EXISTING_WEIGHTS: StrategyWeights =
    StrategyWeights { new_files: 20.0, existing_files: 80.0 };

impl StrategyWeights {
    /// Weight table keyed by source, as consumed by the selector.
    pub fn as_items(&self) -> Vec<(f64, Source)> {
        vec![
            (self.new_files, Source::ChainEvent),
            (self.existing_files, Source::DbScan),
        ]
    }
}

fn normalize_strategy(strategy: &StrategyConfig) -> Result<StrategyWeights, ConfigError> {
    match strategy {
        StrategyConfig::Preset(name) => match name.as_str() {
            "default" => Ok(DEFAULT_WEIGHTS),
            "newFilesFirst" => Ok(NEW_FILES_FIRST_WEIGHTS),
            "preferExisting" => Ok(PREFER_EXISTING_WEIGHTS),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        },
        StrategyConfig::Weights(raw) => {
            let total = raw.new_files + raw.existing_files;
            if raw.new_files < 0.0 || raw.existing_files < 0.0 || total <= 0.0 {
                warn!("invalid strategy weights configured, using default weights");
                return Ok(DEFAULT_WEIGHTS);
            }
            Ok(StrategyWeights {
                new_files: raw.new_files / total * 100.0,
                existing_files: raw.existing_files / total * 100.0,
            })
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// This node's chain account, also the seed of the admission draw.
    pub account: String,
    /// Owner account of the replica group this node belongs to.
    pub owner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSchedulerConfig {
    #[serde(default = "default_strategy")]
    pub strategy: StrategyConfig,
    /// Minimum self-reported-data ratio (percent) before scheduling starts.
    #[serde(default = "default_min_srd_ratio")]
    pub min_srd_ratio: u8,
    /// Global budget on concurrent seal operations.
    #[serde(default = "default_max_pending_tasks")]
    pub max_pending_tasks: u32,
    /// Minimum admitted file size in MB, 0 = unbounded.
    #[serde(default)]
    pub min_file_size: u64,
    /// Maximum admitted file size in MB, 0 = unbounded.
    #[serde(default)]
    pub max_file_size: u64,
    /// Replica floor for the prefer-existing strategy, 0 = unbounded.
    #[serde(default)]
    pub min_replicas: u32,
    /// Replica ceiling above which a file is never pulled, 0 = unbounded.
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
}

fn default_strategy() -> StrategyConfig {
    StrategyConfig::Preset("default".to_string())
}

fn default_min_srd_ratio() -> u8 {
    30
}

fn default_max_pending_tasks() -> u32 {
    16
}

fn default_max_replicas() -> u32 {
    200
}

/// Normalized scheduler options.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub strategy: StrategyWeights,
    pub min_srd_ratio: u8,
    pub max_pending_tasks: u32,
    pub min_file_size_mb: u64,
    pub max_file_size_mb: u64,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    node: NodeConfig,
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    scheduler: RawSchedulerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Fully normalized configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub data_dir: PathBuf,
    pub scheduler: SchedulerConfig,
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = toml::from_str(s)?;
        Config::normalize(raw)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let s = fs::read_to_string(path.as_ref())?;
        Config::from_toml(&s)
    }

    fn normalize(raw: RawConfig) -> Result<Config, ConfigError> {
        if raw.scheduler.max_pending_tasks < 1 {
            return Err(ConfigError::Invalid("max_pending_tasks must be >= 1"));
        }
        if raw.scheduler.min_srd_ratio > 100 {
            return Err(ConfigError::Invalid("min_srd_ratio must be a percentage"));
        }
        let strategy = normalize_strategy(&raw.scheduler.strategy)?;
        Ok(Config {
            node: raw.node,
            data_dir: raw.data_dir,
            scheduler: SchedulerConfig {
                strategy,
                min_srd_ratio: raw.scheduler.min_srd_ratio,
                max_pending_tasks: raw.scheduler.max_pending_tasks,
                min_file_size_mb: raw.scheduler.min_file_size,
                max_file_size_mb: raw.scheduler.max_file_size,
                min_replicas: raw.scheduler.min_replicas,
                max_replicas: raw.scheduler.max_replicas,
            },
        })
    }
}

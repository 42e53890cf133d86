use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::ip::{NetworkToSplit, PoolError};
use crate::utils::validation::parse_networks;

/// Name of the pool used for networks local to one host
pub const LOCAL_POOL: &str = "local";
/// Name of the pool used for networks spanning hosts
pub const GLOBAL_POOL: &str = "global";

/// Top-level configuration that mirrors the YAML configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Named pools, each a list of base prefixes to split
    #[serde(default = "default_pools")]
    pub pools: BTreeMap<String, Vec<NetworkToSplit>>,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = &self.general.log_level {
            if log::LevelFilter::from_str(level).is_err() {
                return Err(ValidationError::InvalidGeneral(format!(
                    "unknown log_level '{}'",
                    level
                )));
            }
        }

        if self.pools.is_empty() {
            return Err(ValidationError::NoPools);
        }

        for (name, nets) in &self.pools {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidPoolName(name.clone()));
            }
            parse_networks(nets).map_err(|source| ValidationError::InvalidPool {
                name: name.clone(),
                source,
            })?;
        }

        Ok(())
    }

    /// Get the configured log level, if any
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.general
            .log_level
            .as_deref()
            .and_then(|level| log::LevelFilter::from_str(level).ok())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            pools: default_pools(),
        }
    }
}

/// Shared general configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("No address pools configured")]
    NoPools,
    #[error("Invalid pool name '{0}'")]
    InvalidPoolName(String),
    #[error("Invalid pool '{name}'")]
    InvalidPool {
        name: String,
        #[source]
        source: PoolError,
    },
}

/// Default pools for networks local to one host
///
/// 172.17.0.0/16 through 172.31.0.0/16 as individual /16s, then
/// 192.168.0.0/16 split into /20s.
pub fn default_local_pools() -> Vec<NetworkToSplit> {
    vec![
        NetworkToSplit::new("172.17.0.0/16", 16),
        NetworkToSplit::new("172.18.0.0/16", 16),
        NetworkToSplit::new("172.19.0.0/16", 16),
        NetworkToSplit::new("172.20.0.0/14", 16),
        NetworkToSplit::new("172.24.0.0/14", 16),
        NetworkToSplit::new("172.28.0.0/14", 16),
        NetworkToSplit::new("192.168.0.0/16", 20),
    ]
}

/// Default pools for networks spanning hosts
pub fn default_global_pools() -> Vec<NetworkToSplit> {
    vec![NetworkToSplit::new("10.0.0.0/8", 24)]
}

fn default_pools() -> BTreeMap<String, Vec<NetworkToSplit>> {
    BTreeMap::from([
        (LOCAL_POOL.to_string(), default_local_pools()),
        (GLOBAL_POOL.to_string(), default_global_pools()),
    ])
}

//! Named subnet pools.
//!
//! This file keeps a registry of named pools (address scopes such as `local`
//! and `global`) and tracks which owner each allocated subnet was handed to,
//! so subnets can be released by prefix alone.

use std::collections::BTreeMap;

use ipnet::IpNet;
use serde::Serialize;

use super::pool::{Pool, PoolError};
use crate::config::Config;
use crate::utils::validation::overlaps;

/// Errors reported by the [`PoolRegistry`]
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown pool '{name}'")]
    UnknownPool { name: String },

    #[error("pool '{name}' is exhausted")]
    Exhausted { name: String },

    #[error("subnet {prefix} is not allocated")]
    NotAllocated { prefix: IpNet },

    #[error("pool '{name}' already exists")]
    DuplicatePool { name: String },

    #[error("pool '{name}' block {base} overlaps {existing} of pool '{other}'")]
    OverlappingPools {
        name: String,
        base: IpNet,
        other: String,
        existing: IpNet,
    },

    #[error("invalid pool '{name}'")]
    InvalidPool {
        name: String,
        #[source]
        source: PoolError,
    },
}

/// Allocation statistics for one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub blocks: usize,
    pub capacity: u64,
    pub allocated: u64,
}

/// Registry of named pools with per-subnet ownership
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: BTreeMap<String, Pool>,
    /// Allocated subnet -> owner
    owners: BTreeMap<IpNet, String>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding one pool per configured scope
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (name, nets) in &config.pools {
            let pool = Pool::from_networks(nets).map_err(|source| RegistryError::InvalidPool {
                name: name.clone(),
                source,
            })?;
            registry.insert_pool(name, pool)?;
        }
        log::info!("Loaded {} address pool(s)", registry.pools.len());
        Ok(registry)
    }

    /// Add a pool under `name`
    ///
    /// Pools must not overlap each other, so that every subnet belongs to
    /// exactly one pool.
    pub fn insert_pool(&mut self, name: &str, pool: Pool) -> Result<(), RegistryError> {
        if self.pools.contains_key(name) {
            return Err(RegistryError::DuplicatePool { name: name.to_string() });
        }
        for (other, existing_pool) in &self.pools {
            for block in pool.blocks() {
                if let Some(existing) = existing_pool
                    .blocks()
                    .iter()
                    .map(|b| b.base())
                    .find(|existing| overlaps(&block.base(), existing))
                {
                    return Err(RegistryError::OverlappingPools {
                        name: name.to_string(),
                        base: block.base(),
                        other: other.clone(),
                        existing,
                    });
                }
            }
        }

        log::debug!(
            "Registered pool '{}' with {} block(s), {} subnets",
            name,
            pool.len(),
            pool.capacity()
        );
        self.pools.insert(name.to_string(), pool);
        Ok(())
    }

    /// Allocate a subnet from pool `name` on behalf of `owner`
    pub fn allocate(&mut self, name: &str, owner: &str) -> Result<IpNet, RegistryError> {
        let pool = self
            .pools
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownPool { name: name.to_string() })?;

        match pool.allocate() {
            Some(prefix) => {
                log::info!("Assigned subnet {} to {} (pool {})", prefix, owner, name);
                self.owners.insert(prefix, owner.to_string());
                Ok(prefix)
            }
            None => {
                log::warn!("Pool '{}' is exhausted, cannot assign a subnet to {}", name, owner);
                Err(RegistryError::Exhausted { name: name.to_string() })
            }
        }
    }

    /// Release an allocated subnet, returning its former owner
    pub fn release(&mut self, prefix: &IpNet) -> Result<String, RegistryError> {
        let owner = self
            .owners
            .remove(prefix)
            .ok_or(RegistryError::NotAllocated { prefix: *prefix })?;

        let released = self
            .pools
            .values_mut()
            .fold(false, |released, pool| pool.release(prefix) || released);
        debug_assert!(released, "owned subnet {prefix} belongs to no pool");

        log::info!("Released subnet {} from {}", prefix, owner);
        Ok(owner)
    }

    /// Get the owner of an allocated subnet
    pub fn owner_of(&self, prefix: &IpNet) -> Option<&str> {
        self.owners.get(prefix).map(String::as_str)
    }

    /// Get the name of the pool a subnet belongs to
    pub fn pool_of(&self, prefix: &IpNet) -> Option<&str> {
        self.pools
            .iter()
            .find(|(_, pool)| pool.contains(prefix))
            .map(|(name, _)| name.as_str())
    }

    pub fn pool(&self, name: &str) -> Option<&Pool> {
        self.pools.get(name)
    }

    pub fn pool_names(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    /// All allocated subnets and their owners, in address order
    pub fn allocations(&self) -> &BTreeMap<IpNet, String> {
        &self.owners
    }

    /// Get statistics about subnet allocation per pool
    pub fn allocation_stats(&self) -> BTreeMap<String, PoolStats> {
        self.pools
            .iter()
            .map(|(name, pool)| {
                let stats = PoolStats {
                    blocks: pool.len(),
                    capacity: pool.capacity(),
                    allocated: pool.allocated(),
                };
                (name.clone(), stats)
            })
            .collect()
    }
}

//! Scripted allocation runs.
//!
//! An operations script is a YAML list of allocate/release steps executed
//! in order against a [`PoolRegistry`]. Every step produces an [`Outcome`],
//! and the run as a whole produces a [`Report`] that serializes to JSON.
//!
//! ```yaml
//! - op: allocate
//!   pool: local
//!   owner: bridge
//! - op: allocate
//!   pool: global
//!   count: 3
//! - op: release
//!   prefix: 172.17.0.0/16
//! ```

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use ipnet::IpNet;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::ip::{PoolRegistry, PoolStats, RegistryError};

/// A single step of an operations script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Allocate {
        pool: String,
        /// Owner recorded for the subnet; defaults to `<pool>-<n>`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default = "default_count")]
        count: u32,
    },
    Release {
        prefix: IpNet,
    },
}

fn default_count() -> u32 {
    1
}

/// Result of one allocation or release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Allocated { pool: String, owner: String, prefix: IpNet },
    Exhausted { pool: String },
    UnknownPool { pool: String },
    Released { prefix: IpNet, owner: String },
    NotAllocated { prefix: IpNet },
}

/// Summary of a scripted run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub steps: Vec<Outcome>,
    pub stats: BTreeMap<String, PoolStats>,
    pub allocations: BTreeMap<IpNet, String>,
}

/// Load an operations script from a YAML file
pub fn load_operations(path: &Path) -> Result<Vec<Operation>> {
    info!("Loading operations from: {:?}", path);
    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open operations file '{}'", path.display()))?;
    let operations: Vec<Operation> = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse operations file '{}'", path.display()))?;
    Ok(operations)
}

/// Execute `operations` in order against `registry`
///
/// Exhaustion, unknown pools and releases of unallocated subnets are
/// recorded as outcomes rather than aborting the run.
pub fn run_operations(registry: &mut PoolRegistry, operations: &[Operation]) -> Result<Report, RegistryError> {
    let mut steps = Vec::new();
    let mut serial: BTreeMap<String, u64> = BTreeMap::new();

    for operation in operations {
        match operation {
            Operation::Allocate { pool, owner, count } => {
                for _ in 0..*count {
                    let owner = match owner {
                        Some(owner) => owner.clone(),
                        None => {
                            let n = serial.entry(pool.clone()).or_insert(0);
                            *n += 1;
                            format!("{}-{}", pool, n)
                        }
                    };
                    steps.push(match registry.allocate(pool, &owner) {
                        Ok(prefix) => Outcome::Allocated {
                            pool: pool.clone(),
                            owner,
                            prefix,
                        },
                        Err(RegistryError::Exhausted { name }) => Outcome::Exhausted { pool: name },
                        Err(RegistryError::UnknownPool { name }) => Outcome::UnknownPool { pool: name },
                        Err(err) => return Err(err),
                    });
                }
            }
            Operation::Release { prefix } => {
                steps.push(match registry.release(prefix) {
                    Ok(owner) => Outcome::Released { prefix: *prefix, owner },
                    Err(RegistryError::NotAllocated { prefix }) => Outcome::NotAllocated { prefix },
                    Err(err) => return Err(err),
                });
            }
        }
    }

    let allocated = steps
        .iter()
        .filter(|step| matches!(step, Outcome::Allocated { .. }))
        .count();
    info!("Executed {} operation(s), {} subnet(s) allocated", operations.len(), allocated);

    Ok(Report {
        steps,
        stats: registry.allocation_stats(),
        allocations: registry.allocations().clone(),
    })
}

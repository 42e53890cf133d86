//! Subnet allocation.
//!
//! This module splits base network prefixes into equally-sized subnets and
//! hands them out to container networks, for IPv4 and IPv6 alike.
//!
//! - `codec`: ordinal <-> subnet prefix arithmetic
//! - `ledger`: sparse bit set recording allocated ordinals
//! - `block`: one base prefix and its ledger
//! - `pool`: several disjoint blocks behind one allocation cursor
//! - `registry`: named pools and subnet ownership

pub mod codec;
pub mod ledger;
pub mod block;
pub mod pool;
pub mod registry;

// Re-export commonly used types
pub use block::{Block, BlockError};
pub use ledger::{Ledger, LedgerError};
pub use pool::{NetworkToSplit, Pool, PoolError};
pub use registry::{PoolRegistry, PoolStats, RegistryError};

//! Multi-block subnet pool.
//!
//! A [`Pool`] aggregates several non-overlapping [`Block`]s and hands out
//! subnets from them with an approximate least-recently-used policy: each
//! allocation starts looking just past the previous one, so a subnet that was
//! just released is not handed out again until the rest of the pool has been
//! tried.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::block::{Block, BlockError};
use crate::utils::validation::{check_disjoint, parse_networks, validate_descriptors};

/// A base network prefix and the prefix length to split it into, in the
/// textual form used by configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkToSplit {
    /// Base prefix in CIDR notation, e.g. `172.17.0.0/16`
    pub base: String,
    /// Prefix length of each subnet carved from `base`
    pub size: u8,
}

impl NetworkToSplit {
    pub fn new(base: impl Into<String>, size: u8) -> Self {
        Self {
            base: base.into(),
            size,
        }
    }
}

/// Errors building a [`Pool`]
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("invalid base network prefix {input:?} at index {index}")]
    InvalidPrefix {
        index: usize,
        input: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("invalid size at index {index}")]
    InvalidSize {
        index: usize,
        #[source]
        source: BlockError,
    },

    #[error("base network prefix {base} at index {index} overlaps {existing}")]
    Overlap {
        index: usize,
        base: IpNet,
        existing: IpNet,
    },
}

/// A set of subnets, drawn from one or more disjoint blocks, that may be
/// individually allocated and released.
///
/// Pools are not safe for concurrent use; callers sharing a pool must hold
/// one exclusive lock across each call.
#[derive(Debug, Clone, Default)]
pub struct Pool {
    blocks: Vec<Block>,
    /// Block to start the next allocation from.
    next_block: usize,
    /// Ordinal within `next_block` to start the next allocation from.
    next_ordinal: u64,
}

impl Pool {
    /// Creates a pool from `(base, subnet_bits)` descriptors.
    ///
    /// Blocks keep the order of `descriptors`, which is also the order they
    /// are scanned in. Fails on the first descriptor with an out-of-range
    /// prefix length or a base overlapping an earlier one.
    pub fn new(descriptors: &[(IpNet, u8)]) -> Result<Self, PoolError> {
        validate_descriptors(descriptors)?;

        let blocks = descriptors
            .iter()
            .enumerate()
            .map(|(index, &(base, subnet_bits))| {
                Block::new(base, subnet_bits).map_err(|source| PoolError::InvalidSize { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("Created pool of {} block(s)", blocks.len());
        Ok(Self::with_blocks(blocks))
    }

    /// Creates a pool from textual descriptors, e.g. as read from a
    /// configuration file.
    pub fn from_networks(nets: &[NetworkToSplit]) -> Result<Self, PoolError> {
        Self::new(&parse_networks(nets)?)
    }

    /// Creates a pool from already-built blocks, which must not overlap.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, PoolError> {
        let mut accepted: Vec<IpNet> = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.iter().enumerate() {
            check_disjoint(index, &block.base(), &accepted)?;
            accepted.push(block.base());
        }
        Ok(Self::with_blocks(blocks))
    }

    fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            next_block: 0,
            next_ordinal: 0,
        }
    }

    /// Allocates an available subnet from the pool.
    ///
    /// The returned subnet will not be allocated again until it is released
    /// with [`Pool::release`]. Allocation makes a best-effort attempt not to
    /// hand out a recently released subnet. Returns `None` when every subnet
    /// is in use.
    pub fn allocate(&mut self) -> Option<IpNet> {
        if self.blocks.is_empty() {
            return None;
        }

        // The cursor splits the current block in two. Scan its right half
        // first, then every other block in circular order, then its left half.
        let current = self.next_block;
        let last = self.blocks[current].capacity() - 1;
        if let Some(found) = self.blocks[current].allocate(Some(self.next_ordinal..=last)) {
            return Some(self.advance(current, found));
        }

        let count = self.blocks.len();
        for index in (1..count).map(|offset| (current + offset) % count) {
            if let Some(found) = self.blocks[index].allocate(None) {
                return Some(self.advance(index, found));
            }
        }

        if let Some(found) = self.blocks[current].allocate(Some(0..=self.next_ordinal)) {
            return Some(self.advance(current, found));
        }

        log::debug!("Pool of {} block(s) is exhausted", count);
        None
    }

    /// Moves the cursor one past the subnet just allocated from block `index`.
    fn advance(&mut self, index: usize, (prefix, ordinal): (IpNet, u64)) -> IpNet {
        if ordinal >= self.blocks[index].capacity() - 1 {
            self.next_block = (index + 1) % self.blocks.len();
            self.next_ordinal = 0;
        } else {
            self.next_block = index;
            self.next_ordinal = ordinal + 1;
        }
        log::debug!("Allocated {} (block {}, ordinal {})", prefix, index, ordinal);
        prefix
    }

    /// Returns `prefix` to the pool, making it available for future
    /// allocations. Returns whether `prefix` is a member of the pool,
    /// irrespective of its allocation status.
    ///
    /// Releasing an already-released subnet is not an error, and prefixes
    /// that were never part of the pool are ignored. Release does not move
    /// the allocation cursor.
    pub fn release(&mut self, prefix: &IpNet) -> bool {
        self.blocks
            .iter_mut()
            .fold(false, |released, block| block.release(prefix) || released)
    }

    /// Whether `prefix` is currently allocated from the pool.
    pub fn is_allocated(&self, prefix: &IpNet) -> bool {
        self.blocks.iter().any(|block| block.is_allocated(prefix))
    }

    /// Whether `prefix` is an allocatable subnet of the pool.
    pub fn contains(&self, prefix: &IpNet) -> bool {
        self.blocks.iter().any(|block| block.contains(prefix))
    }

    /// The blocks of the pool, in scan order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total number of allocatable subnets, saturated to `u64::MAX`.
    pub fn capacity(&self) -> u64 {
        self.blocks
            .iter()
            .fold(0u64, |total, block| total.saturating_add(block.capacity()))
    }

    /// Number of subnets currently allocated.
    pub fn allocated(&self) -> u64 {
        self.blocks
            .iter()
            .fold(0u64, |total, block| total.saturating_add(block.allocated()))
    }

    /// The `(block index, ordinal)` the next allocation starts from.
    pub fn cursor(&self) -> (usize, u64) {
        (self.next_block, self.next_ordinal)
    }

    #[cfg(test)]
    pub(crate) fn set_cursor(&mut self, block: usize, ordinal: u64) {
        assert!(ordinal < self.blocks[block].capacity());
        self.next_block = block;
        self.next_ordinal = ordinal;
    }
}

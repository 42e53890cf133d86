//! A single base prefix split into equally-sized subnets.

use std::ops::RangeInclusive;

use ipnet::IpNet;

use super::codec;
use super::ledger::{Ledger, LedgerError};
use crate::utils::validation::check_subnet_bits;

/// Errors building a [`Block`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("subnet bits {subnet_bits} out of range for base prefix {base}")]
    SubnetBitsOutOfRange { base: IpNet, subnet_bits: u8 },
}

/// A set of equally-sized subnets subdivided from a common base prefix that
/// may be individually allocated and released.
///
/// For example, base=10.1.0.0/16 and subnet_bits=20 yields sixteen subnets,
/// 10.1.0.0/20, 10.1.16.0/20, ... 10.1.240.0/20.
///
/// Only the first `2^64 - 1` subnets of a block are allocatable.
///
/// Blocks are not safe for concurrent use.
#[derive(Debug, Clone)]
pub struct Block {
    /// Always in canonical (masked) form.
    base: IpNet,
    /// `base.prefix_len() <= subnet_bits <= base.max_prefix_len()`
    subnet_bits: u8,
    ledger: Ledger,
}

impl Block {
    /// Creates a block splitting `base` into `/subnet_bits` subnets.
    ///
    /// Host bits set in `base` are cleared.
    pub fn new(base: IpNet, subnet_bits: u8) -> Result<Self, BlockError> {
        check_subnet_bits(&base, subnet_bits)?;

        let capacity = codec::subnet_count(base.prefix_len(), subnet_bits);
        log::debug!(
            "Created block {} split into /{} ({} subnets)",
            base.trunc(),
            subnet_bits,
            capacity
        );

        Ok(Self {
            base: base.trunc(),
            subnet_bits,
            ledger: Ledger::new(capacity),
        })
    }

    /// The prefix being subdivided.
    pub fn base(&self) -> IpNet {
        self.base
    }

    pub fn subnet_bits(&self) -> u8 {
        self.subnet_bits
    }

    /// Number of allocatable subnets.
    pub fn capacity(&self) -> u64 {
        self.ledger.len()
    }

    /// Number of subnets currently allocated.
    pub fn allocated(&self) -> u64 {
        self.ledger.count()
    }

    /// Allocates the lowest free subnet, optionally restricted to an inclusive
    /// range of ordinals, and returns it along with its ordinal.
    ///
    /// Returns `None` when no subnet in range is free.
    ///
    /// # Panics
    /// Panics if `range` is empty or extends past [`capacity`](Self::capacity),
    /// like slice indexing.
    pub fn allocate(&mut self, range: Option<RangeInclusive<u64>>) -> Option<(IpNet, u64)> {
        match self.ledger.set_any(range) {
            Ok(ordinal) => Some((self.subnet(ordinal), ordinal)),
            Err(LedgerError::NoBitAvailable) => None,
            Err(err) => panic!("allocating from {}: {}", self.base, err),
        }
    }

    /// Marks `prefix` as available for future allocations. Returns whether
    /// `prefix` is a member of the block, irrespective of its allocation status.
    ///
    /// Releasing an already-released subnet is not an error. Prefixes that do
    /// not belong to the block are ignored.
    pub fn release(&mut self, prefix: &IpNet) -> bool {
        let Some(ordinal) = self.ordinal(prefix) else {
            return false;
        };
        if let Err(err) = self.ledger.unset(ordinal) {
            panic!("releasing {} from {}: {}", prefix, self.base, err);
        }
        log::debug!("Released {} (ordinal {}) back to {}", prefix.trunc(), ordinal, self.base);
        true
    }

    /// Whether `prefix` is an allocatable subnet of this block.
    pub fn contains(&self, prefix: &IpNet) -> bool {
        self.ordinal(prefix).is_some()
    }

    /// Whether `prefix` is a subnet of this block and currently allocated.
    pub fn is_allocated(&self, prefix: &IpNet) -> bool {
        self.ordinal(prefix).map_or(false, |n| self.ledger.is_set(n))
    }

    pub(crate) fn subnet(&self, ordinal: u64) -> IpNet {
        codec::subnet_of(&self.base, self.subnet_bits, ordinal)
    }

    /// Ordinal of `prefix`, or `None` if it is foreign to the block or lies
    /// past the saturated capacity.
    fn ordinal(&self, prefix: &IpNet) -> Option<u64> {
        codec::locate(&self.base, self.subnet_bits, prefix)
            .and_then(|n| u64::try_from(n).ok())
            .filter(|&n| n < self.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_block() {
        let cases = [
            ("v4 shorter than base", "192.168.0.0/16", 8, false),
            ("v6 shorter than base", "2001::/16", 8, false),
            ("v4 longer than address", "192.168.0.0/16", 33, false),
            ("v6 longer than address", "2001::/16", 129, false),
            ("v4 host routes", "192.168.1.0/24", 32, true),
            ("v6 host routes", "fe80::/64", 128, true),
            ("v4 unsplit", "10.0.0.0/8", 8, true),
        ];
        for (name, base, subnet_bits, ok) in cases {
            let result = Block::new(net(base), subnet_bits);
            assert_eq!(result.is_ok(), ok, "{name}: {result:?}");
        }

        let err = Block::new(net("192.168.0.0/16"), 8).unwrap_err();
        assert_eq!(
            err,
            BlockError::SubnetBitsOutOfRange {
                base: net("192.168.0.0/16"),
                subnet_bits: 8
            }
        );
    }

    #[test]
    fn test_base_is_masked() {
        let block = Block::new(net("10.1.2.3/16"), 24).unwrap();
        assert_eq!(block.base(), net("10.1.0.0/16"));
        assert_eq!(block.subnet_bits(), 24);
        assert_eq!(block.capacity(), 256);
    }

    #[test]
    fn test_single_host_capacity() {
        let mut v4 = Block::new(net("192.168.1.7/32"), 32).unwrap();
        assert_eq!(v4.capacity(), 1);
        assert_eq!(v4.allocate(None), Some((net("192.168.1.7/32"), 0)));
        assert_eq!(v4.allocate(None), None);

        let v6 = Block::new(net("fe80::1/128"), 128).unwrap();
        assert_eq!(v6.capacity(), 1);
    }

    #[test]
    fn test_allocate_until_exhausted() {
        for (base, subnet_bits) in [("10.1.0.0/16", 20), ("fe80::/10", 14)] {
            let mut block = Block::new(net(base), subnet_bits).unwrap();
            assert_eq!(block.capacity(), 16);
            for i in 0..16 {
                let (prefix, ordinal) = block.allocate(None).unwrap_or_else(|| panic!("could not allocate network {i}"));
                assert_eq!(ordinal, i);
                assert!(block.is_allocated(&prefix));
            }
            let extra = block.allocate(None);
            assert!(extra.is_none(), "got unexpected allocation {extra:?}");
            assert_eq!(block.allocated(), 16);
        }
    }

    #[test]
    fn test_release_enables_reallocation() {
        let mut block = Block::new(net("fe80::/10"), 74).unwrap();
        assert_eq!(block.capacity(), u64::MAX);

        block.allocate(None).unwrap();
        let (prefix, ordinal) = block.allocate(None).unwrap();

        assert!(block.release(&prefix));
        assert!(!block.is_allocated(&prefix));
        assert_eq!(block.allocate(None), Some((prefix, ordinal)));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut block = Block::new(net("10.1.0.0/16"), 20).unwrap();
        let (prefix, _) = block.allocate(None).unwrap();
        assert!(block.release(&prefix));
        assert!(block.release(&prefix));
        assert_eq!(block.allocated(), 0);
    }

    #[test]
    fn test_release_foreign_prefix() {
        let mut block = Block::new(net("10.1.0.0/16"), 20).unwrap();
        block.allocate(None).unwrap();
        assert!(!block.release(&net("10.2.0.0/20")));
        assert!(!block.release(&net("10.1.0.0/24")));
        assert!(!block.release(&net("10.1.0.0/16")));
        assert!(!block.release(&net("::/20")));
        assert_eq!(block.allocated(), 1);
    }

    #[test]
    fn test_saturated_last_subnet_is_foreign() {
        let mut block = Block::new(net("aaaa::/16"), 80).unwrap();
        let unreachable = net("aaaa:ffff:ffff:ffff:ffff::/80");
        assert!(!block.contains(&unreachable));
        assert!(!block.release(&unreachable));

        let last = net("aaaa:ffff:ffff:ffff:fffe::/80");
        assert!(block.contains(&last));
        let max = block.capacity() - 1;
        assert_eq!(block.allocate(Some(max..=max)), Some((last, u64::MAX - 1)));
        assert!(block.release(&last));
    }

    #[test]
    fn test_allocate_in_range() {
        let mut block = Block::new(net("10.1.0.0/16"), 20).unwrap();
        assert_eq!(block.allocate(Some(4..=15)), Some((net("10.1.64.0/20"), 4)));
        assert_eq!(block.allocate(Some(15..=15)), Some((net("10.1.240.0/20"), 15)));
        assert_eq!(block.allocate(Some(15..=15)), None);
    }

    #[test]
    #[should_panic(expected = "invalid range")]
    fn test_allocate_out_of_bounds_range_panics() {
        let mut block = Block::new(net("10.1.0.0/16"), 20).unwrap();
        block.allocate(Some(0..=16));
    }
}

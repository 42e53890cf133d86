//! Allocation ledger.
//!
//! A fixed-length bit set recording which subnet ordinals of a block are
//! allocated. Blocks can hold up to `u64::MAX` subnets, so the set is stored
//! sparsely as a map of maximal runs of set bits rather than as a dense bit
//! vector.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Errors reported by [`Ledger`] operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("no bit available")]
    NoBitAvailable,

    #[error("invalid range {start}..={end} for ledger of {len} bits")]
    InvalidRange { start: u64, end: u64, len: u64 },

    #[error("bit {index} out of range for ledger of {len} bits")]
    OutOfRange { index: u64, len: u64 },
}

/// Fixed-capacity bit set with lowest-first allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    len: u64,
    /// Runs of set bits, keyed by first index, valued by last index (inclusive).
    /// Runs never touch: the bit after each run is always clear.
    runs: BTreeMap<u64, u64>,
    count: u64,
}

impl Ledger {
    /// Creates a ledger of `len` clear bits.
    pub fn new(len: u64) -> Self {
        Self {
            len,
            runs: BTreeMap::new(),
            count: 0,
        }
    }

    /// Number of bits in the ledger.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_set(&self, index: u64) -> bool {
        self.run_containing(index).is_some()
    }

    /// Sets the lowest clear bit, optionally restricted to an inclusive range,
    /// and returns its index.
    ///
    /// # Returns
    /// * `Ok(index)` - the bit that was set
    /// * `Err(LedgerError::NoBitAvailable)` - every bit in range is already set
    /// * `Err(LedgerError::InvalidRange)` - the range is empty or extends past the end
    pub fn set_any(&mut self, range: Option<RangeInclusive<u64>>) -> Result<u64, LedgerError> {
        let (start, end) = match range {
            Some(range) => {
                let (start, end) = range.into_inner();
                if start > end || end >= self.len {
                    return Err(LedgerError::InvalidRange {
                        start,
                        end,
                        len: self.len,
                    });
                }
                (start, end)
            }
            None if self.len == 0 => return Err(LedgerError::NoBitAvailable),
            None => (0, self.len - 1),
        };

        // `last < len <= u64::MAX`, so `last + 1` cannot overflow.
        let candidate = match self.run_containing(start) {
            Some((_, last)) => last + 1,
            None => start,
        };
        if candidate > end {
            return Err(LedgerError::NoBitAvailable);
        }

        self.insert(candidate);
        Ok(candidate)
    }

    /// Clears bit `index`, returning whether it was set.
    pub fn unset(&mut self, index: u64) -> Result<bool, LedgerError> {
        if index >= self.len {
            return Err(LedgerError::OutOfRange {
                index,
                len: self.len,
            });
        }
        let Some((first, last)) = self.run_containing(index) else {
            return Ok(false);
        };

        self.runs.remove(&first);
        if first < index {
            self.runs.insert(first, index - 1);
        }
        if index < last {
            self.runs.insert(index + 1, last);
        }
        self.count -= 1;
        Ok(true)
    }

    fn run_containing(&self, index: u64) -> Option<(u64, u64)> {
        self.runs
            .range(..=index)
            .next_back()
            .filter(|(_, &last)| last >= index)
            .map(|(&first, &last)| (first, last))
    }

    /// Sets a bit known to be clear, merging it into neighbouring runs.
    fn insert(&mut self, index: u64) {
        let mut first = index;
        let mut last = index;

        if let Some((prev_first, _)) = index.checked_sub(1).and_then(|prev| self.run_containing(prev)) {
            self.runs.remove(&prev_first);
            first = prev_first;
        }
        if let Some(next_last) = index.checked_add(1).and_then(|next| self.runs.remove(&next)) {
            last = next_last;
        }

        self.runs.insert(first, last);
        self.count += 1;
    }
}

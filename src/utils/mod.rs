//! Shared utilities: descriptor validation.

pub mod validation;

pub use validation::{check_disjoint, check_subnet_bits, overlaps, parse_networks, validate_descriptors};

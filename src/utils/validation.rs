//! Construction-time validation of pool descriptors.
//!
//! These checks run before any ledger is allocated, so a configuration can be
//! validated without building the pools it describes.

use ipnet::IpNet;

use crate::ip::block::BlockError;
use crate::ip::pool::{NetworkToSplit, PoolError};

/// Validate the subnet prefix length for a base prefix
///
/// `subnet_bits` must lie between the base prefix length and the address
/// width (32 for IPv4, 128 for IPv6), inclusive.
///
/// # Examples
/// ```
/// use subnetpool::utils::validation::check_subnet_bits;
///
/// let base = "10.0.0.0/16".parse().unwrap();
/// assert!(check_subnet_bits(&base, 24).is_ok());
/// assert!(check_subnet_bits(&base, 32).is_ok());
/// assert!(check_subnet_bits(&base, 8).is_err());
/// assert!(check_subnet_bits(&base, 33).is_err());
/// ```
pub fn check_subnet_bits(base: &IpNet, subnet_bits: u8) -> Result<(), BlockError> {
    if subnet_bits > base.max_prefix_len() || base.prefix_len() > subnet_bits {
        return Err(BlockError::SubnetBitsOutOfRange {
            base: *base,
            subnet_bits,
        });
    }
    Ok(())
}

/// Whether two prefixes share any address.
pub fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    a.contains(b) || b.contains(a)
}

/// Check that the base prefix at `index` does not overlap any previously
/// accepted base prefix
pub fn check_disjoint<'a, I>(index: usize, base: &IpNet, accepted: I) -> Result<(), PoolError>
where
    I: IntoIterator<Item = &'a IpNet>,
{
    match accepted.into_iter().find(|existing| overlaps(base, existing)) {
        Some(existing) => Err(PoolError::Overlap {
            index,
            base: *base,
            existing: *existing,
        }),
        None => Ok(()),
    }
}

/// Validate a list of `(base, subnet_bits)` descriptors
///
/// Checks, in order, for every descriptor:
/// - The subnet prefix length is in range for its base
/// - The base does not overlap an earlier base
///
/// # Returns
/// * `Ok(())` if every descriptor is valid
/// * `Err(PoolError)` naming the index of the first offending descriptor
pub fn validate_descriptors(descriptors: &[(IpNet, u8)]) -> Result<(), PoolError> {
    let mut accepted: Vec<IpNet> = Vec::with_capacity(descriptors.len());
    for (index, (base, subnet_bits)) in descriptors.iter().enumerate() {
        check_subnet_bits(base, *subnet_bits).map_err(|source| PoolError::InvalidSize { index, source })?;
        check_disjoint(index, base, &accepted)?;
        accepted.push(*base);
    }
    Ok(())
}

/// Parse and validate textual network descriptors
///
/// Each base must be a prefix in CIDR notation (e.g. `172.17.0.0/16`). The
/// result is ready to hand to [`Pool::new`](crate::ip::Pool::new).
///
/// # Examples
/// ```
/// use subnetpool::ip::NetworkToSplit;
/// use subnetpool::utils::validation::parse_networks;
///
/// let nets = [NetworkToSplit::new("10.0.0.0/8", 24), NetworkToSplit::new("fd00::/8", 64)];
/// assert_eq!(parse_networks(&nets).unwrap().len(), 2);
///
/// let overlapping = [NetworkToSplit::new("10.0.0.0/8", 24), NetworkToSplit::new("10.1.0.0/16", 24)];
/// assert!(parse_networks(&overlapping).is_err());
/// ```
pub fn parse_networks(nets: &[NetworkToSplit]) -> Result<Vec<(IpNet, u8)>, PoolError> {
    let descriptors = nets
        .iter()
        .enumerate()
        .map(|(index, net)| {
            net.base
                .trim()
                .parse::<IpNet>()
                .map(|base| (base, net.size))
                .map_err(|source| PoolError::InvalidPrefix {
                    index,
                    input: net.base.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    validate_descriptors(&descriptors)?;
    Ok(descriptors)
}

//! Ordinal/prefix arithmetic.
//!
//! A block splits a base prefix into `2^(subnet_bits - base_bits)` equal
//! subnets, numbered in address order. The ordinal of a subnet is the bit
//! field between the base prefix and the subnet prefix:
//!
//! ```text
//! base = 10.42.0.0/16, subnet_bits = 20, subnet = 10.42.224.0/20
//!
//!   00001010 00101010 | 1110 | 0000 00000000
//!   base bits (16)    | n=14 | host bits (12)
//! ```
//!
//! IPv4 addresses are handled as `u32` and IPv6 addresses as `u128`, so every
//! shift and addition is exact for ordinals up to `u64::MAX`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

/// Number of subnets in a block, saturated to `u64::MAX`.
///
/// A block of `2^64` or more subnets is tracked with a `u64` ordinal space, so
/// its subnets past ordinal `u64::MAX - 1` can never be handed out.
pub fn subnet_count(base_bits: u8, subnet_bits: u8) -> u64 {
    let exponent = u32::from(subnet_bits.saturating_sub(base_bits));
    1u64.checked_shl(exponent).unwrap_or(u64::MAX)
}

/// Returns the subnet of `base` with prefix length `subnet_bits` and ordinal
/// `ordinal`.
///
/// # Panics
/// Panics if `ordinal` does not name a subnet of `base`. Callers derive
/// ordinals from a ledger sized by [`subnet_count`], so this only fires when
/// the two disagree.
///
/// # Examples
/// ```
/// use subnetpool::ip::codec::subnet_of;
///
/// let base = "10.1.0.0/16".parse().unwrap();
/// assert_eq!(subnet_of(&base, 20, 3).to_string(), "10.1.48.0/20");
/// ```
pub fn subnet_of(base: &IpNet, subnet_bits: u8, ordinal: u64) -> IpNet {
    let shift = u32::from(base.max_prefix_len() - subnet_bits);
    let addr = match add(base.network(), ordinal, shift) {
        Some(addr) if ordinal < subnet_count(base.prefix_len(), subnet_bits) => addr,
        _ => panic!("bug: ordinal {ordinal} out of range for {base} split into /{subnet_bits}"),
    };
    match IpNet::new(addr, subnet_bits) {
        Ok(net) => net,
        Err(err) => panic!("bug: /{subnet_bits} is not a valid prefix length for {addr}: {err}"),
    }
}

/// Returns the ordinal for which `subnet_of(base, subnet_bits, ordinal) == prefix`.
///
/// Returns `None` if `prefix` is not a `/subnet_bits` subnet inside `base`.
///
/// # Panics
/// Panics if the ordinal does not fit in 64 bits, which can only happen for
/// blocks with more than `2^64` subnets.
pub fn ordinal_of(base: &IpNet, subnet_bits: u8, prefix: &IpNet) -> Option<u64> {
    let field = locate(base, subnet_bits, prefix)?;
    match u64::try_from(field) {
        Ok(ordinal) => Some(ordinal),
        Err(_) => panic!("bug: got out of range value {field:#x} for subnet ordinal of {prefix} in {base}"),
    }
}

/// Like [`ordinal_of`], but returns the full width of the subnet field.
pub(crate) fn locate(base: &IpNet, subnet_bits: u8, prefix: &IpNet) -> Option<u128> {
    if prefix.prefix_len() != subnet_bits || !base.contains(prefix) {
        return None;
    }
    Some(field(prefix.trunc().network(), base.prefix_len(), subnet_bits))
}

/// Returns `addr + (value << shift)`, or `None` if the result does not fit in
/// the address family.
pub fn add(addr: IpAddr, value: u64, shift: u32) -> Option<IpAddr> {
    match addr {
        IpAddr::V4(a) => {
            let offset = shifted(value, shift, Ipv4Addr::BITS)?;
            let sum = u128::from(u32::from(a)).checked_add(offset)?;
            u32::try_from(sum).ok().map(|n| IpAddr::V4(Ipv4Addr::from(n)))
        }
        IpAddr::V6(a) => {
            let offset = shifted(value, shift, Ipv6Addr::BITS)?;
            u128::from(a).checked_add(offset).map(|n| IpAddr::V6(Ipv6Addr::from(n)))
        }
    }
}

/// Extracts bits `[from, to)` of `addr`, counted from the most significant
/// bit, as an unsigned integer.
pub fn field(addr: IpAddr, from: u8, to: u8) -> u128 {
    let (bits, width) = match addr {
        IpAddr::V4(a) => (u128::from(u32::from(a)), Ipv4Addr::BITS),
        IpAddr::V6(a) => (u128::from(a), Ipv6Addr::BITS),
    };
    let (from, to) = (u32::from(from), u32::from(to).min(width));
    if from >= to {
        return 0;
    }
    (bits >> (width - to)) & low_mask(to - from)
}

fn shifted(value: u64, shift: u32, width: u32) -> Option<u128> {
    if value == 0 {
        return Some(0);
    }
    let significant = u64::BITS - value.leading_zeros();
    if significant + shift > width {
        return None;
    }
    Some(u128::from(value) << shift)
}

fn low_mask(bits: u32) -> u128 {
    if bits >= u128::BITS {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_subnet_count() {
        assert_eq!(subnet_count(16, 16), 1);
        assert_eq!(subnet_count(16, 20), 16);
        assert_eq!(subnet_count(0, 32), 1 << 32);
        assert_eq!(subnet_count(16, 79), 1 << 63);
        assert_eq!(subnet_count(16, 80), u64::MAX);
        assert_eq!(subnet_count(0, 128), u64::MAX);
    }

    #[test]
    fn test_subnet_of_ipv4() {
        let base = net("10.1.0.0/16");
        assert_eq!(subnet_of(&base, 20, 0), net("10.1.0.0/20"));
        assert_eq!(subnet_of(&base, 20, 1), net("10.1.16.0/20"));
        assert_eq!(subnet_of(&base, 20, 15), net("10.1.240.0/20"));

        let hosts = net("192.168.1.0/24");
        assert_eq!(subnet_of(&hosts, 32, 255), net("192.168.1.255/32"));
    }

    #[test]
    fn test_subnet_of_ipv6_wide() {
        let base = net("aaaa::/16");
        assert_eq!(subnet_of(&base, 80, 0), net("aaaa::/80"));
        assert_eq!(subnet_of(&base, 80, 1), net("aaaa::1:0:0:0/80"));
        assert_eq!(
            subnet_of(&base, 80, u64::MAX - 1),
            net("aaaa:ffff:ffff:ffff:fffe::/80")
        );
    }

    #[test]
    fn test_whole_address_space() {
        let v4 = net("0.0.0.0/0");
        assert_eq!(subnet_of(&v4, 0, 0), v4);
        assert_eq!(ordinal_of(&v4, 0, &v4), Some(0));

        let v6 = net("::/0");
        assert_eq!(subnet_of(&v6, 0, 0), v6);
        assert_eq!(ordinal_of(&v6, 0, &v6), Some(0));
    }

    #[test]
    fn test_ordinal_of_rejects_foreign_prefixes() {
        let base = net("10.42.0.0/16");
        assert_eq!(ordinal_of(&base, 20, &net("10.42.224.0/20")), Some(14));
        // Host bits are ignored.
        assert_eq!(ordinal_of(&base, 20, &net("10.42.225.7/20")), Some(14));
        // Wrong length.
        assert_eq!(ordinal_of(&base, 20, &net("10.42.224.0/24")), None);
        // Outside the base.
        assert_eq!(ordinal_of(&base, 20, &net("10.43.0.0/20")), None);
        // Other family.
        assert_eq!(ordinal_of(&base, 20, &net("fe80::/20")), None);
    }

    #[test]
    fn test_locate_beyond_u64() {
        let base = net("::/0");
        let last = net("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff/128");
        assert_eq!(locate(&base, 128, &last), Some(u128::MAX));
    }

    #[test]
    #[should_panic(expected = "out of range value")]
    fn test_ordinal_of_panics_beyond_u64() {
        let base = net("::/0");
        ordinal_of(&base, 128, &net("ffff::/128"));
    }

    #[test]
    #[should_panic(expected = "out of range for")]
    fn test_subnet_of_panics_past_capacity() {
        subnet_of(&net("10.1.0.0/16"), 20, 16);
    }

    #[test]
    fn test_add_overflow() {
        let top: IpAddr = "255.255.255.255".parse().unwrap();
        assert_eq!(add(top, 1, 0), None);
        let zero: IpAddr = "0.0.0.0".parse().unwrap();
        assert_eq!(add(zero, 1, 32), None);
        assert_eq!(add(zero, 0, 32), Some(zero));
        let v6: IpAddr = "::".parse().unwrap();
        assert_eq!(add(v6, u64::MAX, 64), "ffff:ffff:ffff:ffff::".parse().ok());
        assert_eq!(add(v6, u64::MAX, 65), None);
    }

    #[test]
    fn test_field() {
        let addr: IpAddr = "10.42.224.0".parse().unwrap();
        assert_eq!(field(addr, 16, 20), 14);
        assert_eq!(field(addr, 0, 8), 10);
        assert_eq!(field(addr, 8, 8), 0);
        let v6: IpAddr = "aaaa:ffff:ffff:ffff:fffe::".parse().unwrap();
        assert_eq!(field(v6, 16, 80), u128::from(u64::MAX - 1));
        assert_eq!(field(v6, 0, 128), 0xaaaa_ffff_ffff_ffff_fffe_u128 << 48);
    }

    #[test]
    fn test_round_trip_random_ordinals() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let cases = [
            ("10.0.0.0/8", 24),
            ("172.16.0.0/12", 32),
            ("0.0.0.0/0", 32),
            ("fe80::/10", 74),
            ("aaaa::/16", 80),
            ("2001:db8::/32", 128),
            ("fd00::/8", 64),
        ];
        for (base, subnet_bits) in cases {
            let base = net(base);
            let count = subnet_count(base.prefix_len(), subnet_bits);
            let mut ordinals = vec![0, count - 1];
            ordinals.extend((0..64).map(|_| rng.gen_range(0..count)));
            for n in ordinals {
                let subnet = subnet_of(&base, subnet_bits, n);
                assert!(base.contains(&subnet), "{subnet} not in {base}");
                assert_eq!(ordinal_of(&base, subnet_bits, &subnet), Some(n), "{base} /{subnet_bits} #{n}");
            }
        }
    }
}

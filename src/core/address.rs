//! Address list helpers shared by every backend
//!
//! `ipnetwork` supplies prefix parsing and containment; this module adds the
//! two list operations policies need: normalising host bits away and
//! subtracting `*_address_exclude` prefixes.

use crate::core::error::{Error, Result};
use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Clears host bits so `10.1.1.7/24` renders as `10.1.1.0/24`.
pub fn normalize(network: IpNetwork) -> IpNetwork {
    IpNetwork::new(network.network(), network.prefix()).unwrap_or(network)
}

/// Parses a literal address used by `translated` terms.
pub fn parse_literal(value: &str) -> Result<IpNetwork> {
    value
        .trim()
        .parse::<IpNetwork>()
        .map(normalize)
        .map_err(|_| Error::InvalidAddress(value.to_string()))
}

/// Removes duplicates, keeping the first occurrence.
pub fn dedup(networks: Vec<IpNetwork>) -> Vec<IpNetwork> {
    let mut seen = Vec::with_capacity(networks.len());
    for network in networks {
        if !seen.contains(&network) {
            seen.push(network);
        }
    }
    seen
}

/// Subtracts every prefix in `excludes` from `networks`.
///
/// A network partially covered by an exclude is split into the minimal set
/// of sub-prefixes that avoid it. Input order is preserved; the pieces of a
/// split network appear in ascending address order.
///
/// # Examples
///
/// ```
/// use aclgen::core::address::exclude;
/// use ipnetwork::IpNetwork;
///
/// let nets: Vec<IpNetwork> = vec!["10.0.0.0/14".parse().unwrap()];
/// let excl: Vec<IpNetwork> = vec!["10.1.0.0/16".parse().unwrap()];
/// let rest: Vec<String> = exclude(&nets, &excl).iter().map(|n| n.to_string()).collect();
/// assert_eq!(rest, vec!["10.0.0.0/16", "10.2.0.0/15"]);
/// ```
pub fn exclude(networks: &[IpNetwork], excludes: &[IpNetwork]) -> Vec<IpNetwork> {
    let mut remaining: Vec<IpNetwork> = networks.iter().copied().map(normalize).collect();
    for excluded in excludes.iter().copied().map(normalize) {
        remaining = remaining
            .into_iter()
            .flat_map(|network| subtract(network, excluded))
            .collect();
    }
    remaining
}

fn subtract(network: IpNetwork, excluded: IpNetwork) -> Vec<IpNetwork> {
    if network.is_ipv4() != excluded.is_ipv4() {
        return vec![network];
    }
    if excluded.prefix() <= network.prefix() && excluded.contains(network.network()) {
        return Vec::new();
    }
    if network.prefix() < excluded.prefix() && network.contains(excluded.network()) {
        return halves(network)
            .into_iter()
            .flat_map(|half| subtract(half, excluded))
            .collect();
    }
    vec![network]
}

/// Splits a prefix into its two children. Host routes cannot be split and
/// are returned unchanged.
fn halves(network: IpNetwork) -> Vec<IpNetwork> {
    match network {
        IpNetwork::V4(net) => {
            let prefix = net.prefix();
            if prefix >= 32 {
                return vec![network];
            }
            let base = u32::from(net.network());
            let upper = base | (1u32 << (31 - prefix));
            [base, upper]
                .into_iter()
                .filter_map(|addr| Ipv4Network::new(Ipv4Addr::from(addr), prefix + 1).ok())
                .map(IpNetwork::V4)
                .collect()
        }
        IpNetwork::V6(net) => {
            let prefix = net.prefix();
            if prefix >= 128 {
                return vec![network];
            }
            let base = u128::from(net.network());
            let upper = base | (1u128 << (127 - prefix));
            [base, upper]
                .into_iter()
                .filter_map(|addr| Ipv6Network::new(Ipv6Addr::from(addr), prefix + 1).ok())
                .map(IpNetwork::V6)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(values: &[&str]) -> Vec<IpNetwork> {
        values.iter().map(|v| v.parse().unwrap()).collect()
    }

    fn strings(networks: &[IpNetwork]) -> Vec<String> {
        networks.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_normalize_clears_host_bits() {
        let net: IpNetwork = "10.1.1.7/24".parse().unwrap();
        assert_eq!(normalize(net).to_string(), "10.1.1.0/24");
    }

    #[test]
    fn test_exclude_whole_network() {
        let result = exclude(&nets(&["10.0.0.0/24"]), &nets(&["10.0.0.0/8"]));
        assert!(result.is_empty());
    }

    #[test]
    fn test_exclude_half() {
        let result = exclude(&nets(&["10.0.0.0/8"]), &nets(&["10.0.0.0/9"]));
        assert_eq!(strings(&result), vec!["10.128.0.0/9"]);
    }

    #[test]
    fn test_exclude_ipv6() {
        let result = exclude(&nets(&["2001:db8::/32"]), &nets(&["2001:db8::/33"]));
        assert_eq!(strings(&result), vec!["2001:db8:8000::/33"]);
    }

    #[test]
    fn test_exclude_ignores_other_family_and_disjoint() {
        let result = exclude(
            &nets(&["10.0.0.0/8", "2001:db8::/32"]),
            &nets(&["192.168.0.0/16", "2001:db9::/32"]),
        );
        assert_eq!(strings(&result), vec!["10.0.0.0/8", "2001:db8::/32"]);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let result = dedup(nets(&["10.0.0.0/8", "10.0.0.0/8", "192.0.2.0/24"]));
        assert_eq!(strings(&result), vec!["10.0.0.0/8", "192.0.2.0/24"]);
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("192.0.2.9/24").unwrap().to_string(), "192.0.2.0/24");
        assert!(matches!(parse_literal("nope"), Err(Error::InvalidAddress(_))));
    }
}

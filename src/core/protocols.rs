//! Protocol numbers, ICMP type tables and port ranges
//!
//! Every backend that emits numeric protocols goes through
//! [`protocol_number`], so the symbolic-to-IANA mapping is identical across
//! platforms.

use crate::core::error::{Error, Result};
use crate::core::policy::AddressFamily;
use serde::{Deserialize, Serialize};
use std::fmt;

/// IANA assigned protocol numbers for the symbolic names policies may use.
const PROTOCOL_NUMBERS: &[(&str, u8)] = &[
    ("hopopt", 0),
    ("icmp", 1),
    ("igmp", 2),
    ("ggp", 3),
    ("ipip", 4),
    ("tcp", 6),
    ("egp", 8),
    ("igp", 9),
    ("udp", 17),
    ("rdp", 27),
    ("ipv6", 41),
    ("ipv6-route", 43),
    ("fragment", 44),
    ("rsvp", 46),
    ("gre", 47),
    ("esp", 50),
    ("ah", 51),
    ("icmpv6", 58),
    ("ipv6-nonxt", 59),
    ("ipv6-opts", 60),
    ("ospf", 89),
    ("pim", 103),
    ("vrrp", 112),
    ("l2tp", 115),
    ("sctp", 132),
    ("udplite", 136),
];

/// ICMPv4 message types by name.
const ICMPV4_TYPES: &[(&str, u8)] = &[
    ("echo-reply", 0),
    ("unreachable", 3),
    ("source-quench", 4),
    ("redirect", 5),
    ("alternate-address", 6),
    ("echo-request", 8),
    ("router-advertisement", 9),
    ("router-solicitation", 10),
    ("time-exceeded", 11),
    ("parameter-problem", 12),
    ("timestamp-request", 13),
    ("timestamp-reply", 14),
    ("information-request", 15),
    ("information-reply", 16),
    ("mask-request", 17),
    ("mask-reply", 18),
    ("conversion-error", 31),
    ("mobile-redirect", 32),
];

/// ICMPv6 message types by name.
const ICMPV6_TYPES: &[(&str, u8)] = &[
    ("destination-unreachable", 1),
    ("packet-too-big", 2),
    ("time-exceeded", 3),
    ("parameter-problem", 4),
    ("echo-request", 128),
    ("echo-reply", 129),
    ("multicast-listener-query", 130),
    ("multicast-listener-report", 131),
    ("multicast-listener-done", 132),
    ("router-solicit", 133),
    ("router-advertisement", 134),
    ("neighbor-solicit", 135),
    ("neighbor-advertisement", 136),
    ("redirect-message", 137),
    ("router-renumbering", 138),
    ("icmp-node-information-query", 139),
    ("icmp-node-information-response", 140),
    ("inverse-neighbor-discovery-solicitation", 141),
    ("inverse-neighbor-discovery-advertisement", 142),
    ("version-2-multicast-listener-report", 143),
    ("home-agent-address-discovery-request", 144),
    ("home-agent-address-discovery-reply", 145),
    ("mobile-prefix-solicitation", 146),
    ("mobile-prefix-advertisement", 147),
    ("certification-path-solicitation", 148),
    ("certification-path-advertisement", 149),
    ("multicast-router-advertisement", 151),
    ("multicast-router-solicitation", 152),
    ("multicast-router-termination", 153),
];

/// Returns the IANA protocol number for a symbolic or numeric protocol.
///
/// # Examples
///
/// ```
/// use aclgen::core::protocols::protocol_number;
///
/// assert_eq!(protocol_number("esp"), Some(50));
/// assert_eq!(protocol_number("ah"), Some(51));
/// assert_eq!(protocol_number("112"), Some(112));
/// assert_eq!(protocol_number("bogus"), None);
/// ```
pub fn protocol_number(protocol: &str) -> Option<u8> {
    if let Ok(number) = protocol.parse::<u8>() {
        return Some(number);
    }
    PROTOCOL_NUMBERS
        .iter()
        .find(|(name, _)| *name == protocol)
        .map(|(_, number)| *number)
}

/// Like [`protocol_number`] but reports the offending term on failure.
pub fn require_protocol_number(term: &str, protocol: &str) -> Result<u8> {
    protocol_number(protocol).ok_or_else(|| Error::UnknownProtocol {
        term: term.to_string(),
        protocol: protocol.to_string(),
    })
}

/// Returns `true` if the protocol only exists in one address family and it
/// is not `family` (`icmp` in IPv6, `icmpv6` in IPv4).
pub fn protocol_excluded_from(protocol: &str, family: AddressFamily) -> bool {
    match family {
        AddressFamily::V4 => matches!(protocol, "icmpv6" | "58"),
        AddressFamily::V6 => matches!(protocol, "icmp" | "1"),
    }
}

/// Returns the ICMP message type number for `name` in `family`.
pub fn icmp_type_number(name: &str, family: AddressFamily) -> Option<u8> {
    let table = match family {
        AddressFamily::V4 => ICMPV4_TYPES,
        AddressFamily::V6 => ICMPV6_TYPES,
    };
    table
        .iter()
        .find(|(type_name, _)| *type_name == name)
        .map(|(_, number)| *number)
}

/// Every ICMP type name known to either family, sorted and deduplicated.
pub fn all_icmp_type_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = ICMPV4_TYPES
        .iter()
        .chain(ICMPV6_TYPES)
        .map(|(name, _)| *name)
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// An inclusive transport port range. A single port has `start == end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Parses `"53"` or `"1024-65535"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use aclgen::core::protocols::PortRange;
    ///
    /// assert_eq!(PortRange::parse("53").unwrap(), PortRange::single(53));
    /// assert_eq!(PortRange::parse("1024-65535").unwrap().end, 65535);
    /// assert!(PortRange::parse("80-22").is_err());
    /// ```
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || Error::InvalidPort(spec.to_string());
        let spec = spec.trim();
        let (start, end) = match spec.split_once('-') {
            Some((low, high)) => (
                low.trim().parse::<u16>().map_err(|_| invalid())?,
                high.trim().parse::<u16>().map_err(|_| invalid())?,
            ),
            None => {
                let port = spec.parse::<u16>().map_err(|_| invalid())?;
                (port, port)
            }
        };
        if start > end {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

//! Arista EOS text backend
//!
//! Renders `ip access-list` / `ipv6 access-list` blocks. Extended filters
//! expand every term into the cross product of its protocols, addresses,
//! ports and ICMP types, one rule line per combination:
//!
//! ```text
//! no ip access-list edge-in
//! ip access-list edge-in
//!  remark edge inbound
//!  remark allow-ssh
//!  permit tcp 10.1.1.0/24 any eq ssh
//! exit
//! ```
//!
//! Addresses are written as CIDR prefixes and `any` stands for an absent
//! address field.

use crate::core::error::{Error, Result};
use crate::core::generator::{
    FilterContext, Generator, ProtocolPorts, ResolvedTerm, Side, resolve_protocol_ports,
};
use crate::core::naming::Naming;
use crate::core::policy::{Action, AddressFamily, Platform, Term};
use crate::core::protocols::{
    PortRange, all_icmp_type_names, icmp_type_number, protocol_excluded_from,
    require_protocol_number,
};
use crate::core::tokens::{SupportTable, Token};
use crate::validators::{REMARK_WIDTH, wrap_remark};
use ipnetwork::IpNetwork;
use std::fmt;
use tracing::{debug, warn};

/// Protocols EOS accepts by keyword; all others are written as numbers.
const NATIVE_PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "icmpv6", "igmp", "ospf", "pim", "vrrp"];

/// TCP port keywords understood by EOS.
const TCP_PORT_NAMES: &[(&str, u16)] = &[
    ("bgp", 179),
    ("chargen", 19),
    ("cmd", 514),
    ("daytime", 13),
    ("discard", 9),
    ("domain", 53),
    ("echo", 7),
    ("exec", 512),
    ("finger", 79),
    ("ftp", 21),
    ("ftp-data", 20),
    ("gopher", 70),
    ("hostname", 101),
    ("ident", 113),
    ("irc", 194),
    ("klogin", 543),
    ("kshell", 544),
    ("login", 513),
    ("lpd", 515),
    ("nntp", 119),
    ("pop2", 109),
    ("pop3", 110),
    ("smtp", 25),
    ("ssh", 22),
    ("sunrpc", 111),
    ("tacacs", 49),
    ("talk", 517),
    ("telnet", 23),
    ("time", 37),
    ("uucp", 540),
    ("whois", 43),
    ("www", 80),
];

/// UDP port keywords understood by EOS.
const UDP_PORT_NAMES: &[(&str, u16)] = &[
    ("biff", 512),
    ("bootpc", 68),
    ("bootps", 67),
    ("discard", 9),
    ("dnsix", 195),
    ("domain", 53),
    ("echo", 7),
    ("isakmp", 500),
    ("mobile-ip", 434),
    ("nameserver", 42),
    ("netbios-dgm", 138),
    ("netbios-ns", 137),
    ("netbios-ss", 139),
    ("non500-isakmp", 4500),
    ("ntp", 123),
    ("rip", 520),
    ("snmp", 161),
    ("snmptrap", 162),
    ("sunrpc", 111),
    ("syslog", 514),
    ("tacacs", 49),
    ("talk", 517),
    ("tftp", 69),
    ("time", 37),
    ("who", 513),
    ("xdmcp", 177),
];

/// Ports matched by `established` on udp terms without a destination port.
const UDP_ESTABLISHED_RANGE: PortRange = PortRange {
    start: 1024,
    end: 65535,
};

/// Filter flavour selected by the header qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AristaFilterType {
    /// `ip access-list standard NAME`, source prefixes only
    Standard,
    /// `ip access-list NAME`
    Extended,
    /// `ipv6 access-list NAME`
    Inet6,
    /// an extended filter plus an `ipv6-NAME` filter
    Mixed,
}

/// One rendered access list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AristaFilter {
    /// The declaration line, e.g. `ip access-list standard edge-in`
    pub declaration: String,
    /// Remark and rule lines, each with its leading space
    pub lines: Vec<String>,
}

impl fmt::Display for AristaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "no {}", self.declaration)?;
        writeln!(f, "{}", self.declaration)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        writeln!(f, "exit")
    }
}

/// The complete Arista artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AristaAcl {
    pub filters: Vec<AristaFilter>,
}

impl fmt::Display for AristaAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{filter}")?;
        }
        Ok(())
    }
}

/// Arista EOS generator
#[derive(Debug, Clone)]
pub struct Arista {
    table: SupportTable,
}

impl Default for Arista {
    fn default() -> Self {
        Self::new()
    }
}

impl Arista {
    pub fn new() -> Self {
        let table = SupportTable::new(Platform::Arista)
            .supported(&[
                Token::Action,
                Token::Address,
                Token::Comment,
                Token::DestinationAddress,
                Token::DestinationAddressExclude,
                Token::DestinationPort,
                Token::DscpMatch,
                Token::Expiration,
                Token::IcmpCode,
                Token::IcmpType,
                Token::StatelessReply,
                Token::Logging,
                Token::Name,
                Token::Option,
                Token::Owner,
                Token::Platform,
                Token::PlatformExclude,
                Token::Protocol,
                Token::RestrictAddressFamily,
                Token::SourceAddress,
                Token::SourceAddressExclude,
                Token::SourcePort,
                Token::Translated,
                Token::Verbatim,
            ])
            .warn_and_drop(&[Token::Counter, Token::Policer])
            .sub_tokens(
                Token::Action,
                &["accept", "deny", "reject", "next", "reject-with-tcp-rst"],
            )
            .sub_tokens(
                Token::Option,
                &["established", "tcp-established", "is-fragment", "fragments"],
            )
            .sub_tokens(Token::IcmpType, &all_icmp_type_names());
        Self { table }
    }
}

/// A term with everything looked up through naming, shared by the filters
/// of a mixed header.
struct PreparedTerm<'a> {
    resolved: ResolvedTerm<'a>,
    ports: Vec<ProtocolPorts>,
}

impl<'a> PreparedTerm<'a> {
    fn new(term: &'a Term, naming: &dyn Naming) -> Result<Self> {
        if !term.address.is_empty()
            && (!term.source_address.is_empty() || !term.destination_address.is_empty())
        {
            return Err(invalid(
                term,
                "address cannot be combined with source or destination addresses",
            ));
        }
        Ok(Self {
            resolved: ResolvedTerm::resolve(term, naming)?,
            ports: resolve_protocol_ports(term, naming)?,
        })
    }

    fn term(&self) -> &'a Term {
        self.resolved.term
    }
}

impl Generator for Arista {
    type FilterType = AristaFilterType;
    type Filter = AristaFilter;
    type Output = AristaAcl;

    fn platform(&self) -> Platform {
        Platform::Arista
    }

    fn support_table(&self) -> &SupportTable {
        &self.table
    }

    fn filter_type(&self, qualifier: Option<&str>) -> Result<AristaFilterType> {
        match qualifier {
            None | Some("extended" | "inet") => Ok(AristaFilterType::Extended),
            Some("standard") => Ok(AristaFilterType::Standard),
            Some("inet6") => Ok(AristaFilterType::Inet6),
            Some("mixed") => Ok(AristaFilterType::Mixed),
            Some(other) => Err(Error::UnsupportedFilterType {
                platform: Platform::Arista.to_string(),
                filter_type: other.to_string(),
            }),
        }
    }

    fn render_filter(
        &self,
        context: &FilterContext<AristaFilterType>,
        terms: &[&Term],
        naming: &dyn Naming,
    ) -> Result<Vec<AristaFilter>> {
        let prepared = terms
            .iter()
            .copied()
            .map(|term| PreparedTerm::new(term, naming))
            .collect::<Result<Vec<_>>>()?;

        let name = &context.name;
        match context.filter_type {
            AristaFilterType::Standard => Ok(vec![standard_filter(context, &prepared)?]),
            AristaFilterType::Extended => Ok(vec![extended_filter(
                context,
                format!("ip access-list {name}"),
                AddressFamily::V4,
                &prepared,
                false,
            )?]),
            AristaFilterType::Inet6 => Ok(vec![extended_filter(
                context,
                format!("ipv6 access-list {name}"),
                AddressFamily::V6,
                &prepared,
                false,
            )?]),
            AristaFilterType::Mixed => Ok(vec![
                extended_filter(
                    context,
                    format!("ip access-list {name}"),
                    AddressFamily::V4,
                    &prepared,
                    true,
                )?,
                extended_filter(
                    context,
                    format!("ipv6 access-list ipv6-{name}"),
                    AddressFamily::V6,
                    &prepared,
                    true,
                )?,
            ]),
        }
    }

    fn assemble(&self, filters: Vec<AristaFilter>) -> AristaAcl {
        AristaAcl { filters }
    }
}

fn invalid(term: &Term, reason: &str) -> Error {
    Error::InvalidTerm {
        term: term.name.clone(),
        reason: reason.to_string(),
    }
}

fn push_remarks(lines: &mut Vec<String>, text: &str) {
    for chunk in wrap_remark(text, REMARK_WIDTH) {
        lines.push(format!(" remark {chunk}"));
    }
}

fn header_lines(context: &FilterContext<AristaFilterType>) -> Vec<String> {
    let mut lines = Vec::new();
    if context.verbose {
        for comment in &context.comment {
            push_remarks(&mut lines, comment);
        }
    }
    lines
}

fn term_remarks(lines: &mut Vec<String>, term: &Term, verbose: bool) {
    if !verbose {
        return;
    }
    push_remarks(lines, &term.name);
    if let Some(owner) = &term.owner {
        push_remarks(lines, &format!("Owner: {owner}"));
    }
    for comment in &term.comment {
        push_remarks(lines, comment);
    }
}

fn verbatim_lines(term: &Term) -> Vec<String> {
    term.verbatim
        .iter()
        .filter(|entry| entry.platform == Platform::Arista.as_ref())
        .flat_map(|entry| entry.text.lines().map(str::to_string))
        .collect()
}

/// Emits a verbatim term's remarks and raw text. Terms without arista text
/// emit nothing.
fn push_verbatim(
    lines: &mut Vec<String>,
    term: &Term,
    context: &FilterContext<AristaFilterType>,
) {
    let raw = verbatim_lines(term);
    if raw.is_empty() {
        debug!("Term {} has no arista verbatim text; skipping", term.name);
        return;
    }
    term_remarks(lines, term, context.verbose);
    lines.extend(raw);
}

fn action_keyword(term: &Term) -> Result<&'static str> {
    match term.action {
        Some(Action::Accept) => Ok("permit"),
        Some(Action::Deny | Action::Reject | Action::RejectWithTcpRst) => Ok("deny"),
        Some(Action::Next) => Ok("! next"),
        None => Err(invalid(term, "term has no action")),
    }
}

fn standard_filter(
    context: &FilterContext<AristaFilterType>,
    prepared: &[PreparedTerm<'_>],
) -> Result<AristaFilter> {
    let mut lines = header_lines(context);

    for entry in prepared {
        let term = entry.term();
        if !term.verbatim.is_empty() {
            push_verbatim(&mut lines, term, context);
            continue;
        }

        if !term.protocol.is_empty()
            || !term.source_port.is_empty()
            || !term.destination_port.is_empty()
            || !term.destination_address.is_empty()
            || !term.option.is_empty()
            || !term.icmp_type.is_empty()
            || !term.dscp_match.is_empty()
        {
            return Err(invalid(term, "standard filters only match source addresses"));
        }
        if term.restrict_address_family == Some(AddressFamily::V6) {
            debug!("Term {} is restricted to inet6; skipping in {}", term.name, context.name);
            continue;
        }

        let sources = entry
            .resolved
            .side(Side::Source, AddressFamily::V4)
            .or_else(|| entry.resolved.address(AddressFamily::V4));
        let targets: Vec<String> = match sources {
            None => vec!["any".to_string()],
            Some(networks) if networks.is_empty() => {
                warn!(
                    "Term {} has no inet addresses for filter {}; skipping",
                    term.name, context.name
                );
                continue;
            }
            Some(networks) => networks.iter().map(ToString::to_string).collect(),
        };

        let action = action_keyword(term)?;
        term_remarks(&mut lines, term, context.verbose);
        for target in targets {
            let mut line = format!(" {action} {target}");
            if term.logging {
                line.push_str(" log");
            }
            lines.push(line);
        }
    }

    Ok(AristaFilter {
        declaration: format!("ip access-list standard {}", context.name),
        lines,
    })
}

fn extended_filter(
    context: &FilterContext<AristaFilterType>,
    declaration: String,
    family: AddressFamily,
    prepared: &[PreparedTerm<'_>],
    mixed: bool,
) -> Result<AristaFilter> {
    let mut lines = header_lines(context);

    for entry in prepared {
        let term = entry.term();
        if !term.verbatim.is_empty() {
            if mixed && family == AddressFamily::V6 {
                debug!("Verbatim term {} is emitted in the inet filter only", term.name);
            } else {
                push_verbatim(&mut lines, term, context);
            }
            continue;
        }

        if let Some(restricted) = term.restrict_address_family
            && restricted != family
        {
            debug!(
                "Term {} is restricted to {}; skipping in {}",
                term.name, restricted, declaration
            );
            continue;
        }
        if entry.resolved.is_empty_in(family) {
            if mixed {
                debug!(
                    "Term {} has no {} addresses; skipping in {}",
                    term.name, family, declaration
                );
            } else {
                warn!(
                    "Term {} has no {} addresses for filter {}; skipping",
                    term.name, family, context.name
                );
            }
            continue;
        }

        let Some(rules) = rule_lines(entry, family)? else {
            debug!(
                "Term {} has no {} protocols; skipping in {}",
                term.name, family, declaration
            );
            continue;
        };
        term_remarks(&mut lines, term, context.verbose);
        lines.extend(rules);
    }

    Ok(AristaFilter { declaration, lines })
}

fn is_icmp(protocol: &str) -> bool {
    matches!(protocol, "icmp" | "1" | "icmpv6" | "58")
}

fn protocol_keyword(term: &Term, protocol: Option<&str>, family: AddressFamily) -> Result<String> {
    match protocol {
        None => Ok(match family {
            AddressFamily::V4 => "ip".to_string(),
            AddressFamily::V6 => "ipv6".to_string(),
        }),
        Some(name) if NATIVE_PROTOCOLS.contains(&name) => Ok(name.to_string()),
        Some(name) => Ok(require_protocol_number(&term.name, name)?.to_string()),
    }
}

/// `eq <port>` or `range <lo> <hi>`, using EOS keywords for well-known ports.
fn port_match(protocol: &str, range: PortRange) -> String {
    if !range.is_single() {
        return format!("range {} {}", range.start, range.end);
    }
    let table = match protocol {
        "tcp" => TCP_PORT_NAMES,
        "udp" => UDP_PORT_NAMES,
        _ => &[],
    };
    match table.iter().find(|(_, port)| *port == range.start) {
        Some((name, _)) => format!("eq {name}"),
        None => format!("eq {}", range.start),
    }
}

fn icmp_matches(term: &Term, family: AddressFamily) -> Result<Vec<Option<String>>> {
    if term.icmp_type.is_empty() {
        return Ok(vec![None]);
    }
    let mut matches = Vec::new();
    for icmp_type in &term.icmp_type {
        let number = icmp_type_number(icmp_type, family).ok_or_else(|| Error::UnknownIcmpType {
            term: term.name.clone(),
            icmp_type: icmp_type.clone(),
            family: family.to_string(),
        })?;
        if term.icmp_code.is_empty() {
            matches.push(Some(number.to_string()));
        } else {
            matches.extend(term.icmp_code.iter().map(|code| Some(format!("{number} {code}"))));
        }
    }
    Ok(matches)
}

fn options_suffix(term: &Term, protocol: Option<&str>) -> Vec<&'static str> {
    let mut suffix = Vec::new();
    if protocol == Some("tcp")
        && (term.has_option("established") || term.has_option("tcp-established"))
    {
        suffix.push("established");
    }
    if term.has_option("is-fragment") || term.has_option("fragments") {
        suffix.push("fragments");
    }
    if term.logging {
        suffix.push("log");
    }
    suffix
}

fn endpoints(networks: Option<Vec<IpNetwork>>) -> Vec<String> {
    match networks {
        None => vec!["any".to_string()],
        Some(networks) => networks.iter().map(ToString::to_string).collect(),
    }
}

/// Expands one term for `family`. Returns `None` when none of the term's
/// protocols exist in `family` or survived port resolution.
fn rule_lines(entry: &PreparedTerm<'_>, family: AddressFamily) -> Result<Option<Vec<String>>> {
    let term = entry.term();
    let action = action_keyword(term)?;

    if !term.icmp_code.is_empty() && term.icmp_type.len() != 1 {
        return Err(invalid(term, "icmp-code requires exactly one icmp-type"));
    }
    if !term.icmp_type.is_empty() && !term.protocol.iter().any(|p| is_icmp(p)) {
        return Err(invalid(term, "icmp-type requires protocol icmp or icmpv6"));
    }

    let protocols: Vec<Option<&ProtocolPorts>> = if term.protocol.is_empty() {
        vec![None]
    } else {
        let usable: Vec<_> = entry
            .ports
            .iter()
            .filter(|ports| !protocol_excluded_from(&ports.protocol, family))
            .map(Some)
            .collect();
        if usable.is_empty() {
            return Ok(None);
        }
        usable
    };

    // The `address` token matches either side: source-side lines first.
    let address_sets: Vec<(Vec<String>, Vec<String>)> = match entry.resolved.address(family) {
        Some(networks) => {
            let listed = endpoints(Some(networks));
            vec![
                (listed.clone(), vec!["any".to_string()]),
                (vec!["any".to_string()], listed),
            ]
        }
        None => vec![(
            endpoints(entry.resolved.side(Side::Source, family)),
            endpoints(entry.resolved.side(Side::Destination, family)),
        )],
    };

    let dscp: Vec<Option<String>> = if term.dscp_match.is_empty() {
        vec![None]
    } else {
        term.dscp_match.iter().map(|v| Some(format!("dscp {v}"))).collect()
    };

    let mut lines = Vec::new();
    for ports in protocols {
        let protocol = ports.map(|p| p.protocol.as_str());
        let keyword = protocol_keyword(term, protocol, family)?;

        let source_ports = port_matches(protocol, ports.map(|p| p.source.as_slice()));
        let mut destination_ports =
            port_matches(protocol, ports.map(|p| p.destination.as_slice()));
        if protocol == Some("udp")
            && term.has_option("established")
            && ports.is_some_and(|p| p.destination.is_empty())
        {
            destination_ports = vec![Some(port_match("udp", UDP_ESTABLISHED_RANGE))];
        }

        let icmp = match protocol {
            Some(p) if is_icmp(p) => icmp_matches(term, family)?,
            _ => vec![None],
        };
        let suffix = options_suffix(term, protocol);

        for (sources, destinations) in &address_sets {
            for source in sources {
                for source_port in &source_ports {
                    for destination in destinations {
                        for destination_port in &destination_ports {
                            for icmp_match in &icmp {
                                for dscp_match in &dscp {
                                    let mut parts =
                                        vec![action, keyword.as_str(), source.as_str()];
                                    parts.extend(source_port.as_deref());
                                    parts.push(destination.as_str());
                                    parts.extend(destination_port.as_deref());
                                    parts.extend(icmp_match.as_deref());
                                    parts.extend(dscp_match.as_deref());
                                    parts.extend(suffix.iter().copied());
                                    lines.push(format!(" {}", parts.join(" ")));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(Some(lines))
}

fn port_matches(protocol: Option<&str>, ports: Option<&[PortRange]>) -> Vec<Option<String>> {
    match (protocol, ports) {
        (Some(protocol), Some(ranges)) if !ranges.is_empty() => ranges
            .iter()
            .map(|range| Some(port_match(protocol, *range)))
            .collect(),
        _ => vec![None],
    }
}

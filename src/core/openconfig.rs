//! OpenConfig ACL backend
//!
//! Produces the `acl-set` list of the OpenConfig ACL model as JSON. Each
//! term expands into one `acl-entry` per combination of address family,
//! source address, destination address, protocol, source port and
//! destination port, numbered 5, 10, 15, ... across the filter.
//!
//! The document is built from typed structs and printed through
//! `serde_json::Value`, whose map keeps keys sorted, so equal input always
//! renders byte-identical output.

use crate::core::error::{Error, Result};
use crate::core::generator::{
    FilterContext, Generator, ProtocolPorts, ResolvedTerm, Side, resolve_protocol_ports,
};
use crate::core::naming::Naming;
use crate::core::policy::{Action, AddressFamily, Platform, Term};
use crate::core::protocols::{
    PortRange, protocol_excluded_from, protocol_number, require_protocol_number,
};
use crate::core::tokens::{SupportTable, Token};
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Sequence id of the first entry and the step between entries.
const SEQUENCE_STEP: u32 = 5;

const TCP_ESTABLISHED: &str = "tcp-established";

/// IANA number of tcp, the only protocol `tcp-established` applies to.
const TCP: u8 = 6;

/// `type` of an acl-set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclType {
    AclIpv4,
    AclIpv6,
    AclMixed,
}

impl AclType {
    fn families(self) -> &'static [AddressFamily] {
        match self {
            AclType::AclIpv4 => &[AddressFamily::V4],
            AclType::AclIpv6 => &[AddressFamily::V6],
            AclType::AclMixed => &[AddressFamily::V4, AddressFamily::V6],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForwardingAction {
    Accept,
    Drop,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclSetConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub acl_type: AclType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclEntries {
    #[serde(rename = "acl-entry")]
    pub entries: Vec<AclEntry>,
}

/// One filter of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclSet {
    pub name: String,
    #[serde(rename = "type")]
    pub acl_type: AclType,
    pub config: AclSetConfig,
    #[serde(rename = "acl-entries")]
    pub acl_entries: AclEntries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionConfig {
    #[serde(rename = "forwarding-action")]
    pub forwarding_action: ForwardingAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actions {
    pub config: ActionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct IpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IpBlock {
    pub config: IpConfig,
}

/// A single port is an integer, a range is the string `"lo..hi"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PortValue {
    Single(u16),
    Range(String),
}

impl From<PortRange> for PortValue {
    fn from(range: PortRange) -> Self {
        if range.is_single() {
            PortValue::Single(range.start)
        } else {
            PortValue::Range(format!("{}..{}", range.start, range.end))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<PortValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<PortValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin_detail: Option<&'static str>,
}

impl TransportConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportBlock {
    pub config: TransportConfig,
}

/// One numbered match-and-action entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclEntry {
    #[serde(rename = "sequence-id")]
    pub sequence_id: u32,
    pub actions: Actions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<IpBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<IpBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportBlock>,
}

/// The complete OpenConfig artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenConfigAcl {
    pub acl_sets: Vec<AclSet>,
}

impl OpenConfigAcl {
    /// Canonical JSON: sorted keys, two-space indent.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if the document cannot be encoded.
    pub fn to_json(&self) -> Result<String> {
        let value = serde_json::to_value(&self.acl_sets)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

impl fmt::Display for OpenConfigAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = self.to_json().map_err(|_| fmt::Error)?;
        writeln!(f, "{json}")
    }
}

/// OpenConfig generator
#[derive(Debug, Clone)]
pub struct OpenConfig {
    table: SupportTable,
}

impl Default for OpenConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenConfig {
    pub fn new() -> Self {
        let table = SupportTable::new(Platform::OpenConfig)
            .supported(&[
                Token::Action,
                Token::Comment,
                Token::DestinationAddress,
                Token::DestinationAddressExclude,
                Token::DestinationPort,
                Token::Expiration,
                Token::Name,
                Token::Option,
                Token::Platform,
                Token::PlatformExclude,
                Token::Protocol,
                Token::SourceAddress,
                Token::SourceAddressExclude,
                Token::SourcePort,
                Token::StatelessReply,
                Token::Translated,
            ])
            .warn_and_drop(&[Token::Counter, Token::Logging, Token::Policer])
            .sub_tokens(Token::Action, &["accept", "deny", "reject"])
            .sub_tokens(Token::Option, &[TCP_ESTABLISHED]);
        Self { table }
    }
}

impl Generator for OpenConfig {
    type FilterType = AclType;
    type Filter = AclSet;
    type Output = OpenConfigAcl;

    fn platform(&self) -> Platform {
        Platform::OpenConfig
    }

    fn support_table(&self) -> &SupportTable {
        &self.table
    }

    fn filter_type(&self, qualifier: Option<&str>) -> Result<AclType> {
        match qualifier {
            Some("inet") => Ok(AclType::AclIpv4),
            Some("inet6") => Ok(AclType::AclIpv6),
            None | Some("mixed") => Ok(AclType::AclMixed),
            Some(other) => Err(Error::UnsupportedFilterType {
                platform: Platform::OpenConfig.to_string(),
                filter_type: other.to_string(),
            }),
        }
    }

    fn render_filter(
        &self,
        context: &FilterContext<AclType>,
        terms: &[&Term],
        naming: &dyn Naming,
    ) -> Result<Vec<AclSet>> {
        let mut entries = Vec::new();
        let mut sequence_id = 0;

        for term in terms.iter().copied() {
            let forwarding_action = forwarding_action(term)?;
            let established = term.has_option(TCP_ESTABLISHED);
            if established
                && (term.protocol.is_empty()
                    || term.protocol.iter().any(|p| protocol_number(p) != Some(TCP)))
            {
                return Err(Error::TcpEstablishedWithNonTcp {
                    term: term.name.clone(),
                    protocols: if term.protocol.is_empty() {
                        "none".to_string()
                    } else {
                        term.protocol.join(" ")
                    },
                });
            }

            let resolved = ResolvedTerm::resolve(term, naming)?;
            let ports = resolve_protocol_ports(term, naming)?;

            for family in context.filter_type.families() {
                if resolved.is_empty_in(*family) {
                    if context.filter_type == AclType::AclMixed {
                        debug!("Term {} has no {} addresses; skipping family", term.name, family);
                    } else {
                        warn!(
                            "Term {} has no {} addresses for filter {}; skipping",
                            term.name, family, context.name
                        );
                    }
                    continue;
                }

                let Some(protocols) = family_protocols(term, &ports, *family) else {
                    debug!("Term {} has no {} protocols; skipping family", term.name, family);
                    continue;
                };

                for source in endpoints(resolved.side(Side::Source, *family)) {
                    for destination in endpoints(resolved.side(Side::Destination, *family)) {
                        for &protocol in &protocols {
                            let number = protocol
                                .map(|p| require_protocol_number(&term.name, &p.protocol))
                                .transpose()?;
                            let source_ports = port_values(protocol.map(|p| p.source.as_slice()));
                            let destination_ports =
                                port_values(protocol.map(|p| p.destination.as_slice()));

                            for source_port in &source_ports {
                                for destination_port in &destination_ports {
                                    sequence_id += SEQUENCE_STEP;
                                    let ip = IpBlock {
                                        config: IpConfig {
                                            source_address: source.map(|n| n.to_string()),
                                            destination_address: destination
                                                .map(|n| n.to_string()),
                                            protocol: number,
                                        },
                                    };
                                    let transport = TransportConfig {
                                        source_port: source_port.clone(),
                                        destination_port: destination_port.clone(),
                                        detail_mode: established.then_some("BUILTIN"),
                                        builtin_detail: established.then_some("TCP_ESTABLISHED"),
                                    };
                                    entries.push(AclEntry {
                                        sequence_id,
                                        actions: Actions {
                                            config: ActionConfig { forwarding_action },
                                        },
                                        ipv4: (*family == AddressFamily::V4).then(|| ip.clone()),
                                        ipv6: (*family == AddressFamily::V6).then_some(ip),
                                        transport: (!transport.is_empty())
                                            .then_some(TransportBlock { config: transport }),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(vec![AclSet {
            name: context.name.clone(),
            acl_type: context.filter_type,
            config: AclSetConfig {
                name: context.name.clone(),
                acl_type: context.filter_type,
            },
            acl_entries: AclEntries { entries },
        }])
    }

    fn assemble(&self, filters: Vec<AclSet>) -> OpenConfigAcl {
        OpenConfigAcl { acl_sets: filters }
    }
}

fn forwarding_action(term: &Term) -> Result<ForwardingAction> {
    match term.action {
        Some(Action::Accept) => Ok(ForwardingAction::Accept),
        Some(Action::Deny) => Ok(ForwardingAction::Drop),
        Some(Action::Reject) => Ok(ForwardingAction::Reject),
        Some(other) => Err(Error::UnsupportedSubToken {
            term: term.name.clone(),
            token: Token::Action.to_string(),
            value: other.to_string(),
            platform: Platform::OpenConfig.to_string(),
        }),
        None => Err(Error::InvalidTerm {
            term: term.name.clone(),
            reason: "term has no action".to_string(),
        }),
    }
}

/// Protocols usable in `family`; `None` when the term lists protocols and
/// none of them exist there or survived port resolution.
fn family_protocols<'a>(
    term: &Term,
    ports: &'a [ProtocolPorts],
    family: AddressFamily,
) -> Option<Vec<Option<&'a ProtocolPorts>>> {
    if term.protocol.is_empty() {
        return Some(vec![None]);
    }
    let usable: Vec<_> = ports
        .iter()
        .filter(|p| !protocol_excluded_from(&p.protocol, family))
        .map(Some)
        .collect();
    (!usable.is_empty()).then_some(usable)
}

fn endpoints(networks: Option<Vec<IpNetwork>>) -> Vec<Option<IpNetwork>> {
    match networks {
        None => vec![None],
        Some(networks) => networks.into_iter().map(Some).collect(),
    }
}

fn port_values(ports: Option<&[PortRange]>) -> Vec<Option<PortValue>> {
    match ports {
        Some(ranges) if !ranges.is_empty() => {
            ranges.iter().map(|r| Some(PortValue::from(*r))).collect()
        }
        _ => vec![None],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::{FakeNaming, TEST_IPS, filter, policy, term};
    use serde_json::{Value, json};

    fn render(naming: &FakeNaming, options: &[&str], terms: Vec<Term>) -> Value {
        let pol = policy(vec![filter(
            "openconfig",
            options,
            &["The general policy comment."],
            terms,
        )]);
        let acl = OpenConfig::new().render(&pol, naming).unwrap();
        serde_json::from_str(&acl.to_string()).unwrap()
    }

    fn corp() -> FakeNaming {
        FakeNaming::new().with_address("CORP_EXTERNAL", TEST_IPS)
    }

    #[test]
    fn test_saddr_inet() {
        let naming = corp();
        let mut t = term("good-term-1");
        t.comment = vec!["Allow source address.".to_string()];
        t.source_address = vec!["CORP_EXTERNAL".to_string()];

        let doc = render(&naming, &["good-name-v4", "inet"], vec![t]);
        assert_eq!(
            doc,
            json!([{
                "acl-entries": {"acl-entry": [{
                    "actions": {"config": {"forwarding-action": "ACCEPT"}},
                    "ipv4": {"config": {"source-address": "10.2.3.4/32"}},
                    "sequence-id": 5
                }]},
                "config": {"name": "good-name-v4", "type": "ACL_IPV4"},
                "name": "good-name-v4",
                "type": "ACL_IPV4"
            }])
        );
        assert_eq!(naming.address_calls(), vec!["CORP_EXTERNAL"]);
    }

    #[test]
    fn test_daddr_inet6() {
        let mut t = term("good-term-1");
        t.destination_address = vec!["CORP_EXTERNAL".to_string()];

        let doc = render(&corp(), &["good-name-v6", "inet6"], vec![t]);
        let entries = &doc[0]["acl-entries"]["acl-entry"];
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(
            entries[0]["ipv6"]["config"]["destination-address"],
            "2001:4860:8000::5/128"
        );
        assert_eq!(doc[0]["type"], "ACL_IPV6");
    }

    #[test]
    fn test_mixed_daddr_numbers_across_families() {
        let mut t = term("good-term-1");
        t.destination_address = vec!["CORP_EXTERNAL".to_string()];

        let doc = render(&corp(), &["good-name-mixed", "mixed"], vec![t]);
        let entries = &doc[0]["acl-entries"]["acl-entry"];
        assert_eq!(entries[0]["sequence-id"], 5);
        assert_eq!(entries[0]["ipv4"]["config"]["destination-address"], "10.2.3.4/32");
        assert_eq!(entries[1]["sequence-id"], 10);
        assert_eq!(
            entries[1]["ipv6"]["config"]["destination-address"],
            "2001:4860:8000::5/128"
        );
        assert_eq!(doc[0]["config"]["type"], "ACL_MIXED");
    }

    #[test]
    fn test_sport_and_dport() {
        let naming = FakeNaming::new().with_service("DNS", &["53"]);
        let mut sport = term("good-term-1");
        sport.protocol = vec!["tcp".to_string()];
        sport.source_port = vec!["DNS".to_string()];

        let doc = render(&naming, &["good-name-v4", "inet"], vec![sport]);
        let entry = &doc[0]["acl-entries"]["acl-entry"][0];
        assert_eq!(entry["ipv4"]["config"], json!({"protocol": 6}));
        assert_eq!(entry["transport"]["config"], json!({"source-port": 53}));
        assert_eq!(
            naming.service_calls(),
            vec![("DNS".to_string(), "tcp".to_string())]
        );
    }

    #[test]
    fn test_multi_protocol_ranges() {
        let naming = FakeNaming::new().with_service("HIGH_PORTS", &["1024-65535"]);
        let mut t = term("good-term-1");
        t.protocol = vec!["udp".to_string(), "tcp".to_string()];
        t.source_port = vec!["HIGH_PORTS".to_string()];
        t.destination_port = vec!["HIGH_PORTS".to_string()];

        let doc = render(&naming, &["good-name-v4", "inet"], vec![t]);
        let entries = &doc[0]["acl-entries"]["acl-entry"];
        for (entry, (seq, proto)) in entries.as_array().unwrap().iter().zip([(5, 17), (10, 6)]) {
            assert_eq!(entry["sequence-id"], seq);
            assert_eq!(entry["ipv4"]["config"]["protocol"], proto);
            assert_eq!(
                entry["transport"]["config"],
                json!({"source-port": "1024..65535", "destination-port": "1024..65535"})
            );
        }
    }

    #[test]
    fn test_everything_expands_protocols_last() {
        let naming = corp().with_service("DNS", &["53"]);
        let mut t = term("good-term-1");
        t.source_address = vec!["CORP_EXTERNAL".to_string()];
        t.destination_address = vec!["CORP_EXTERNAL".to_string()];
        t.destination_port = vec!["DNS".to_string()];
        t.protocol = vec!["udp".to_string(), "tcp".to_string()];

        let doc = render(&naming, &["good-name-v4", "inet"], vec![t]);
        let entries = doc[0]["acl-entries"]["acl-entry"].as_array().unwrap().clone();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0]["ipv4"]["config"],
            json!({"source-address": "10.2.3.4/32", "destination-address": "10.2.3.4/32", "protocol": 17})
        );
        assert_eq!(entries[1]["ipv4"]["config"]["protocol"], 6);
        assert_eq!(
            naming.service_calls(),
            vec![
                ("DNS".to_string(), "udp".to_string()),
                ("DNS".to_string(), "tcp".to_string())
            ]
        );
    }

    #[test]
    fn test_tcp_established_builtin() {
        let naming = corp().with_service("HTTP", &["80"]);
        let mut t = term("good-tcp-est");
        t.protocol = vec!["tcp".to_string()];
        t.destination_address = vec!["CORP_EXTERNAL".to_string()];
        t.source_port = vec!["HTTP".to_string()];
        t.option = vec!["tcp-established".to_string()];

        let doc = render(&naming, &["good-name-v4", "inet"], vec![t]);
        assert_eq!(
            doc[0]["acl-entries"]["acl-entry"][0]["transport"]["config"],
            json!({"source-port": 80, "detail-mode": "BUILTIN", "builtin-detail": "TCP_ESTABLISHED"})
        );
        assert_eq!(naming.service_calls().len(), 1);
    }

    #[test]
    fn test_tcp_established_rejects_udp_before_lookup() {
        let naming = FakeNaming::new().with_service("DNS", &["53"]);
        let mut t = term("bad-tcp-est");
        t.protocol = vec!["tcp".to_string(), "udp".to_string()];
        t.source_port = vec!["DNS".to_string()];
        t.option = vec!["tcp-established".to_string()];
        let pol = policy(vec![filter("openconfig", &["good-name-v4", "inet"], &[], vec![t])]);

        let err = OpenConfig::new().render(&pol, &naming).unwrap_err();
        assert!(matches!(err, Error::TcpEstablishedWithNonTcp { ref term, .. } if term == "bad-tcp-est"));
        assert!(naming.service_calls().is_empty());
    }

    #[test]
    fn test_tcp_established_requires_tcp_protocol() {
        let mut t = term("no-proto-est");
        t.option = vec!["tcp-established".to_string()];
        let pol = policy(vec![filter("openconfig", &["f", "inet"], &[], vec![t.clone()])]);
        assert!(matches!(
            OpenConfig::new().render(&pol, &FakeNaming::new()),
            Err(Error::TcpEstablishedWithNonTcp { ref protocols, .. }) if protocols == "none"
        ));

        t.protocol = vec!["6".to_string()];
        let doc = render(&FakeNaming::new(), &["f", "inet"], vec![t]);
        let entry = &doc[0]["acl-entries"]["acl-entry"][0];
        assert_eq!(entry["ipv4"]["config"]["protocol"], 6);
        assert_eq!(entry["transport"]["config"]["builtin-detail"], "TCP_ESTABLISHED");
    }

    #[test]
    fn test_protocol_without_service_ports_is_not_widened() {
        let naming = corp().with_service_for("SSH", "tcp", &["22"]);
        let mut t = term("ssh");
        t.destination_address = vec!["CORP_EXTERNAL".to_string()];
        t.protocol = vec!["tcp".to_string(), "udp".to_string()];
        t.destination_port = vec!["SSH".to_string()];

        let doc = render(&naming, &["f", "inet"], vec![t.clone()]);
        let entries = doc[0]["acl-entries"]["acl-entry"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["ipv4"]["config"]["protocol"], 6);
        assert_eq!(entries[0]["transport"]["config"]["destination-port"], 22);

        t.protocol = vec!["udp".to_string()];
        let doc = render(&naming, &["f", "inet"], vec![t]);
        assert!(doc[0]["acl-entries"]["acl-entry"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_empty_match_keeps_family_block() {
        let doc = render(&FakeNaming::new(), &["all", "inet"], vec![term("any")]);
        let entry = &doc[0]["acl-entries"]["acl-entry"][0];
        assert_eq!(entry["ipv4"], json!({"config": {}}));
        assert!(entry.get("transport").is_none());
    }

    #[test]
    fn test_actions_map_to_forwarding_actions() {
        let mut deny = term("deny");
        deny.action = Some(Action::Deny);
        let mut reject = term("reject");
        reject.action = Some(Action::Reject);
        let doc = render(&FakeNaming::new(), &["f", "inet"], vec![deny, reject]);
        let entries = &doc[0]["acl-entries"]["acl-entry"];
        assert_eq!(entries[0]["actions"]["config"]["forwarding-action"], "DROP");
        assert_eq!(entries[1]["actions"]["config"]["forwarding-action"], "REJECT");
    }

    #[test]
    fn test_logging_is_dropped() {
        let mut t = term("logged");
        t.logging = true;
        let doc = render(&FakeNaming::new(), &["f", "inet"], vec![t]);
        assert_eq!(doc[0]["acl-entries"]["acl-entry"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_rejected_filter_types() {
        for qualifier in ["standard", "extended"] {
            let pol = policy(vec![filter("openconfig", &["f", qualifier], &[], vec![])]);
            assert!(matches!(
                OpenConfig::new().render(&pol, &FakeNaming::new()),
                Err(Error::UnsupportedFilterType { .. })
            ));
        }
    }

    #[test]
    fn test_output_is_byte_stable() {
        let naming = corp().with_service("DNS", &["53"]);
        let mut t = term("t");
        t.destination_address = vec!["CORP_EXTERNAL".to_string()];
        t.protocol = vec!["udp".to_string()];
        t.destination_port = vec!["DNS".to_string()];
        let pol = policy(vec![filter("openconfig", &["f"], &[], vec![t])]);

        let first = OpenConfig::new().render(&pol, &naming).unwrap().to_string();
        let second = OpenConfig::new().render(&pol, &naming).unwrap().to_string();
        assert_eq!(first, second);
        assert!(first.find("\"acl-entries\"").unwrap() < first.find("\"config\"").unwrap());
    }
}

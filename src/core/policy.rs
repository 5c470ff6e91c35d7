//! Policy object graph
//!
//! This module defines the in-memory form of a parsed policy: an ordered list
//! of filters, each a [`Header`] plus its ordered [`Term`]s. The policy
//! language parser produces this graph; aclgen reads it as JSON so any parser
//! can feed it.
//!
//! Address and port fields hold *symbolic* names (`CORP_EXTERNAL`, `DNS`)
//! that backends resolve through a [`Naming`](crate::core::naming::Naming)
//! implementation at render time. A term marked `translated` carries literal
//! CIDRs and port specs instead.
//!
//! Terms are never mutated by backends.
//!
//! # Example
//!
//! ```
//! use aclgen::core::policy::Policy;
//!
//! let policy = Policy::from_json_str(r#"{
//!   "filters": [{
//!     "header": {
//!       "targets": [{ "platform": "arista", "options": ["edge-in", "standard"] }],
//!       "comment": ["edge inbound"]
//!     },
//!     "terms": [{ "name": "allow-corp", "source_address": ["CORP"], "action": "accept" }]
//!   }]
//! }"#).unwrap();
//!
//! assert_eq!(policy.filters[0].terms[0].name, "allow-corp");
//! ```

use crate::core::error::Result;
use crate::core::tokens::Token;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Target platforms with a registered backend
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Arista EOS text ACLs
    #[strum(serialize = "arista")]
    Arista,
    /// OpenConfig structured ACL document
    #[strum(serialize = "openconfig")]
    OpenConfig,
}

impl Platform {
    /// File extension used for this platform's artifacts.
    pub const fn file_extension(self) -> &'static str {
        match self {
            Platform::Arista => "eos",
            Platform::OpenConfig => "oacl.json",
        }
    }
}

/// Term action
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    Accept,
    Deny,
    Reject,
    Next,
    RejectWithTcpRst,
}

/// IP address family
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
pub enum AddressFamily {
    #[serde(rename = "inet")]
    #[strum(serialize = "inet")]
    V4,
    #[serde(rename = "inet6")]
    #[strum(serialize = "inet6")]
    V6,
}

impl AddressFamily {
    pub fn contains(self, network: &ipnetwork::IpNetwork) -> bool {
        match self {
            AddressFamily::V4 => network.is_ipv4(),
            AddressFamily::V6 => network.is_ipv6(),
        }
    }
}

/// Raw platform text inserted instead of a generated rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verbatim {
    pub platform: String,
    pub text: String,
}

/// One platform a header renders to: `options[0]` is the filter name, the
/// rest are qualifiers (filter type, `noverbose`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub platform: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub targets: Vec<Target>,
    #[serde(default)]
    pub comment: Vec<String>,
}

impl Header {
    /// Returns the target naming `platform`, if the header renders to it.
    pub fn target(&self, platform: Platform) -> Option<&Target> {
        self.targets
            .iter()
            .find(|target| target.platform == platform.as_ref())
    }
}

/// One access-control rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Term {
    pub name: String,
    pub action: Option<Action>,
    pub comment: Vec<String>,
    pub owner: Option<String>,
    pub expiration: Option<NaiveDate>,
    pub protocol: Vec<String>,
    pub address: Vec<String>,
    pub source_address: Vec<String>,
    pub source_address_exclude: Vec<String>,
    pub destination_address: Vec<String>,
    pub destination_address_exclude: Vec<String>,
    pub source_port: Vec<String>,
    pub destination_port: Vec<String>,
    pub option: Vec<String>,
    pub icmp_type: Vec<String>,
    pub icmp_code: Vec<u8>,
    pub dscp_match: Vec<String>,
    pub logging: bool,
    pub platform: Vec<String>,
    pub platform_exclude: Vec<String>,
    pub restrict_address_family: Option<AddressFamily>,
    pub stateless_reply: bool,
    pub translated: bool,
    pub verbatim: Vec<Verbatim>,
    pub counter: Option<String>,
    pub policer: Option<String>,
    pub qos: Option<String>,
    pub ttl: Option<u8>,
    pub hop_limit: Option<u8>,
    pub packet_length: Option<String>,
    pub source_interface: Option<String>,
    pub destination_interface: Option<String>,
}

impl Term {
    /// Lists the tokens present on this term, in a stable order.
    pub fn tokens(&self) -> Vec<Token> {
        let present = [
            (Token::Name, true),
            (Token::Action, self.action.is_some()),
            (Token::Comment, !self.comment.is_empty()),
            (Token::Owner, self.owner.is_some()),
            (Token::Expiration, self.expiration.is_some()),
            (Token::Protocol, !self.protocol.is_empty()),
            (Token::Address, !self.address.is_empty()),
            (Token::SourceAddress, !self.source_address.is_empty()),
            (
                Token::SourceAddressExclude,
                !self.source_address_exclude.is_empty(),
            ),
            (Token::DestinationAddress, !self.destination_address.is_empty()),
            (
                Token::DestinationAddressExclude,
                !self.destination_address_exclude.is_empty(),
            ),
            (Token::SourcePort, !self.source_port.is_empty()),
            (Token::DestinationPort, !self.destination_port.is_empty()),
            (Token::Option, !self.option.is_empty()),
            (Token::IcmpType, !self.icmp_type.is_empty()),
            (Token::IcmpCode, !self.icmp_code.is_empty()),
            (Token::DscpMatch, !self.dscp_match.is_empty()),
            (Token::Logging, self.logging),
            (Token::Platform, !self.platform.is_empty()),
            (Token::PlatformExclude, !self.platform_exclude.is_empty()),
            (
                Token::RestrictAddressFamily,
                self.restrict_address_family.is_some(),
            ),
            (Token::StatelessReply, self.stateless_reply),
            (Token::Translated, self.translated),
            (Token::Verbatim, !self.verbatim.is_empty()),
            (Token::Counter, self.counter.is_some()),
            (Token::Policer, self.policer.is_some()),
            (Token::Qos, self.qos.is_some()),
            (Token::Ttl, self.ttl.is_some()),
            (Token::HopLimit, self.hop_limit.is_some()),
            (Token::PacketLength, self.packet_length.is_some()),
            (Token::SourceInterface, self.source_interface.is_some()),
            (
                Token::DestinationInterface,
                self.destination_interface.is_some(),
            ),
        ];
        present
            .into_iter()
            .filter_map(|(token, is_present)| is_present.then_some(token))
            .collect()
    }

    /// Values used for a restricted token (`action`, `icmp_type`, `option`).
    pub fn sub_tokens(&self, token: Token) -> Vec<&str> {
        match token {
            Token::Action => self.action.iter().map(|a| a.as_ref()).collect(),
            Token::IcmpType => self.icmp_type.iter().map(String::as_str).collect(),
            Token::Option => self.option.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.option.iter().any(|o| o == option)
    }
}

/// A header and its terms.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Filter {
    pub header: Header,
    #[serde(default)]
    pub terms: Vec<Term>,
}

/// The parsed policy: filters in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policy {
    pub filters: Vec<Filter>,
}

impl Policy {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a policy object graph from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

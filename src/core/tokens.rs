//! Token support tables
//!
//! A *token* is a policy field name (`source_address`, `option`, ...) and a
//! *sub-token* is a permitted value for one of the restricted fields
//! (`action`, `icmp_type`, `option`). Every backend declares a
//! [`SupportTable`] next to its translation code, and [`SupportTable::validate`]
//! is the one routine that checks a term against it before translation.
//!
//! Each declared token carries a [`TokenPolicy`]: `Supported` tokens are
//! rendered, `Warn` tokens are logged and dropped from the output while the
//! term is still emitted. Tokens missing from the table abort the render.

use crate::core::error::{Error, Result};
use crate::core::policy::{Platform, Term};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Every policy field a term can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Token {
    Action,
    Address,
    Comment,
    Counter,
    DestinationAddress,
    DestinationAddressExclude,
    DestinationInterface,
    DestinationPort,
    DscpMatch,
    Expiration,
    HopLimit,
    IcmpCode,
    IcmpType,
    Logging,
    Name,
    Option,
    Owner,
    PacketLength,
    Platform,
    PlatformExclude,
    Policer,
    Protocol,
    Qos,
    RestrictAddressFamily,
    SourceAddress,
    SourceAddressExclude,
    SourceInterface,
    SourcePort,
    StatelessReply,
    Translated,
    Ttl,
    Verbatim,
}

/// How a backend treats a token it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Rendered into the output
    Supported,
    /// Logged as a warning and dropped; the term is still rendered
    Warn,
}

/// Static capability declaration of one backend.
#[derive(Debug, Clone)]
pub struct SupportTable {
    platform: Platform,
    tokens: BTreeMap<Token, TokenPolicy>,
    sub_tokens: BTreeMap<Token, BTreeSet<&'static str>>,
}

/// `(supported_tokens, supported_sub_tokens)` as plain names.
pub type TokenDeclaration = (
    BTreeSet<&'static str>,
    BTreeMap<&'static str, BTreeSet<&'static str>>,
);

impl SupportTable {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            tokens: BTreeMap::new(),
            sub_tokens: BTreeMap::new(),
        }
    }

    pub fn supported(mut self, tokens: &[Token]) -> Self {
        for token in tokens {
            self.tokens.insert(*token, TokenPolicy::Supported);
        }
        self
    }

    pub fn warn_and_drop(mut self, tokens: &[Token]) -> Self {
        for token in tokens {
            self.tokens.insert(*token, TokenPolicy::Warn);
        }
        self
    }

    pub fn sub_tokens(mut self, token: Token, values: &[&'static str]) -> Self {
        self.sub_tokens
            .entry(token)
            .or_default()
            .extend(values.iter().copied());
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn policy(&self, token: Token) -> Option<TokenPolicy> {
        self.tokens.get(&token).copied()
    }

    pub fn is_supported(&self, token: Token) -> bool {
        self.policy(token) == Some(TokenPolicy::Supported)
    }

    /// Returns the backend's declaration: supported token names and the
    /// permitted values of each restricted token. `Warn` tokens are not
    /// part of the supported set.
    pub fn build_tokens(&self) -> TokenDeclaration {
        let tokens = self
            .tokens
            .iter()
            .filter(|(_, policy)| **policy == TokenPolicy::Supported)
            .map(|(token, _)| <&'static str>::from(*token))
            .collect();
        let sub_tokens = self
            .sub_tokens
            .iter()
            .map(|(token, values)| (<&'static str>::from(*token), values.clone()))
            .collect();
        (tokens, sub_tokens)
    }

    /// Checks every token and restricted value used by `term`.
    ///
    /// Returns the `Warn` tokens present on the term; the caller renders the
    /// term without them.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedToken`] for a token the table does not declare
    /// - [`Error::UnsupportedSubToken`] for a disallowed restricted value
    pub fn validate(&self, term: &Term) -> Result<Vec<Token>> {
        let mut dropped = Vec::new();

        for token in term.tokens() {
            match self.policy(token) {
                Some(TokenPolicy::Supported) => {}
                Some(TokenPolicy::Warn) => {
                    debug!(
                        "Term {} uses {} which {} does not support; it will be rendered without it",
                        term.name, token, self.platform
                    );
                    dropped.push(token);
                }
                None => {
                    return Err(Error::UnsupportedToken {
                        term: term.name.clone(),
                        token: token.to_string(),
                        platform: self.platform.to_string(),
                    });
                }
            }
        }

        for (token, permitted) in &self.sub_tokens {
            for value in term.sub_tokens(*token) {
                if !permitted.contains(value) {
                    return Err(Error::UnsupportedSubToken {
                        term: term.name.clone(),
                        token: token.to_string(),
                        value: value.to_string(),
                        platform: self.platform.to_string(),
                    });
                }
            }
        }

        Ok(dropped)
    }
}

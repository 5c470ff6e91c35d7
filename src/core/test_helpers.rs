//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::core::error::{Error, NameKind, Result};
use crate::core::naming::Naming;
use crate::core::policy::{Action, Filter, Header, Policy, Target, Term};
use ipnetwork::IpNetwork;
use std::cell::RefCell;
use std::collections::HashMap;

/// One IPv4 and one IPv6 host, the usual fixture for family splitting.
pub const TEST_IPS: &[&str] = &["10.2.3.4/32", "2001:4860:8000::5/128"];

/// Deterministic in-memory [`Naming`] that records every lookup.
///
/// Services added with [`with_service`](Self::with_service) return the same
/// port specs for every protocol, so tests can assert on the
/// `(name, protocol)` pairs a backend asked for. Services added with
/// [`with_service_for`](Self::with_service_for) only have ports for the
/// protocols they were added for and resolve to nothing for the others.
///
/// # Example
///
/// ```ignore
/// let naming = FakeNaming::new()
///     .with_address("CORP_EXTERNAL", TEST_IPS)
///     .with_service("DNS", &["53"]);
/// // ... render ...
/// assert_eq!(naming.address_calls(), vec!["CORP_EXTERNAL"]);
/// ```
#[derive(Debug, Default)]
pub struct FakeNaming {
    addresses: HashMap<String, Vec<IpNetwork>>,
    services: HashMap<String, Vec<String>>,
    protocol_services: HashMap<(String, String), Vec<String>>,
    address_calls: RefCell<Vec<String>>,
    service_calls: RefCell<Vec<(String, String)>>,
}

impl FakeNaming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, name: &str, networks: &[&str]) -> Self {
        let parsed = networks
            .iter()
            .map(|n| n.parse().expect("test network must parse"))
            .collect();
        self.addresses.insert(name.to_string(), parsed);
        self
    }

    pub fn with_service(mut self, name: &str, ports: &[&str]) -> Self {
        self.services.insert(
            name.to_string(),
            ports.iter().map(ToString::to_string).collect(),
        );
        self
    }

    pub fn with_service_for(mut self, name: &str, protocol: &str, ports: &[&str]) -> Self {
        self.protocol_services.insert(
            (name.to_string(), protocol.to_string()),
            ports.iter().map(ToString::to_string).collect(),
        );
        self
    }

    pub fn address_calls(&self) -> Vec<String> {
        self.address_calls.borrow().clone()
    }

    pub fn service_calls(&self) -> Vec<(String, String)> {
        self.service_calls.borrow().clone()
    }
}

impl Naming for FakeNaming {
    fn resolve_address(&self, name: &str) -> Result<Vec<IpNetwork>> {
        self.address_calls.borrow_mut().push(name.to_string());
        self.addresses
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnresolvedName {
                kind: NameKind::Address,
                name: name.to_string(),
            })
    }

    fn resolve_service(&self, name: &str, protocol: &str) -> Result<Vec<String>> {
        self.service_calls
            .borrow_mut()
            .push((name.to_string(), protocol.to_string()));
        let key = (name.to_string(), protocol.to_string());
        if let Some(ports) = self.protocol_services.get(&key) {
            return Ok(ports.clone());
        }
        if let Some(ports) = self.services.get(name) {
            return Ok(ports.clone());
        }
        if self.protocol_services.keys().any(|(known, _)| known == name) {
            return Ok(Vec::new());
        }
        Err(Error::UnresolvedName {
            kind: NameKind::Service,
            name: name.to_string(),
        })
    }
}

/// Creates an `accept` term with no match fields.
///
/// This is the canonical helper for creating test terms; set the fields a
/// test needs on the returned value.
pub fn term(name: &str) -> Term {
    Term {
        name: name.to_string(),
        action: Some(Action::Accept),
        ..Term::default()
    }
}

/// Creates a filter whose header targets a single platform.
pub fn filter(platform: &str, options: &[&str], comment: &[&str], terms: Vec<Term>) -> Filter {
    Filter {
        header: Header {
            targets: vec![Target {
                platform: platform.to_string(),
                options: options.iter().map(ToString::to_string).collect(),
            }],
            comment: comment.iter().map(ToString::to_string).collect(),
        },
        terms,
    }
}

pub fn policy(filters: Vec<Filter>) -> Policy {
    Policy { filters }
}

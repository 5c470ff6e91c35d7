//! Backend contract and the render pipeline every backend shares
//!
//! A backend implements [`Generator`]: it declares its [`SupportTable`],
//! maps header qualifiers to its own filter type, and translates one
//! filter's surviving terms. [`Generator::render_with`] owns everything
//! in between:
//!
//! 1. select the filters whose header targets the backend
//! 2. parse the target into a [`FilterContext`]
//! 3. validate each term against the support table
//! 4. drop terms excluded by `platform` / `platform_exclude`
//! 5. drop expired terms, log terms that expire soon
//! 6. drop `stateless_reply` terms
//!
//! Any error aborts the whole render, so callers never see a partial
//! artifact.

use crate::core::address;
use crate::core::error::{Error, Result};
use crate::core::naming::Naming;
use crate::core::policy::{AddressFamily, Filter, Platform, Policy, Term};
use crate::core::protocols::PortRange;
use crate::core::tokens::{SupportTable, TokenDeclaration};
use crate::validators;
use chrono::{Local, NaiveDate, TimeDelta};
use ipnetwork::IpNetwork;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Knobs for one render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Terms expiring within this many weeks are reported at info level.
    pub exp_info_weeks: u32,
    pub today: NaiveDate,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            exp_info_weeks: 2,
            today: Local::now().date_naive(),
        }
    }
}

impl RenderOptions {
    pub fn new(exp_info_weeks: u32) -> Self {
        Self {
            exp_info_weeks,
            ..Self::default()
        }
    }
}

/// A header target after parsing, with the backend's filter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterContext<T> {
    pub name: String,
    pub filter_type: T,
    /// `false` when the header carries `noverbose`
    pub verbose: bool,
    pub comment: Vec<String>,
}

/// Qualifier meaning "suppress comments in output".
pub const NOVERBOSE: &str = "noverbose";

/// Fixed interface between the pipeline and a platform backend.
pub trait Generator {
    /// Backend-specific filter flavour parsed from the header qualifier
    type FilterType: Copy + std::fmt::Debug;
    /// One rendered filter
    type Filter;
    /// The complete artifact
    type Output;

    fn platform(&self) -> Platform;

    fn support_table(&self) -> &SupportTable;

    /// `(supported_tokens, supported_sub_tokens)` for introspection.
    fn build_tokens(&self) -> TokenDeclaration {
        self.support_table().build_tokens()
    }

    /// Maps the header's filter-type qualifier (`None` when absent).
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFilterType`] for qualifiers the backend rejects.
    fn filter_type(&self, qualifier: Option<&str>) -> Result<Self::FilterType>;

    /// Translates the surviving terms of one filter. A header may yield more
    /// than one filter (e.g. one per address family).
    fn render_filter(
        &self,
        context: &FilterContext<Self::FilterType>,
        terms: &[&Term],
        naming: &dyn Naming,
    ) -> Result<Vec<Self::Filter>>;

    fn assemble(&self, filters: Vec<Self::Filter>) -> Self::Output;

    /// Renders `policy` with default options.
    fn render(&self, policy: &Policy, naming: &dyn Naming) -> Result<Self::Output> {
        self.render_with(policy, naming, &RenderOptions::default())
    }

    /// Runs the shared pipeline and assembles the artifact.
    ///
    /// # Errors
    ///
    /// The first validation, resolution or translation error; nothing is
    /// returned for the filters rendered before it.
    fn render_with(
        &self,
        policy: &Policy,
        naming: &dyn Naming,
        options: &RenderOptions,
    ) -> Result<Self::Output> {
        let platform = self.platform();
        let mut rendered = Vec::new();

        for filter in &policy.filters {
            let Some(context) = filter_context(self, filter)? else {
                continue;
            };
            debug!(
                "Rendering {} filter {} ({} terms)",
                platform,
                context.name,
                filter.terms.len()
            );

            let mut terms = Vec::with_capacity(filter.terms.len());
            let mut dropped = BTreeSet::new();
            for term in &filter.terms {
                dropped.extend(self.support_table().validate(term)?);
                if keep_term(term, platform, &context.name, options) {
                    terms.push(term);
                }
            }
            if !dropped.is_empty() {
                warn!(
                    "Filter {} is rendered for {} without unsupported tokens: {}",
                    context.name,
                    platform,
                    dropped
                        .iter()
                        .map(|token| <&'static str>::from(*token))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }

            rendered.extend(self.render_filter(&context, &terms, naming)?);
        }

        Ok(self.assemble(rendered))
    }
}

/// Parses the header target for `generator`'s platform, if any.
fn filter_context<G: Generator + ?Sized>(
    generator: &G,
    filter: &Filter,
) -> Result<Option<FilterContext<G::FilterType>>> {
    let Some(target) = filter.header.target(generator.platform()) else {
        return Ok(None);
    };

    let name = target.options.first().map(String::as_str).unwrap_or_default();
    validators::validate_filter_name(name).map_err(|reason| Error::InvalidFilterName {
        name: name.to_string(),
        reason,
    })?;

    let mut verbose = true;
    let mut qualifier = None;
    for option in target.options.iter().skip(1) {
        if option == NOVERBOSE {
            verbose = false;
        } else if qualifier.is_none() {
            qualifier = Some(option.as_str());
        } else {
            return Err(Error::UnsupportedFilterType {
                platform: generator.platform().to_string(),
                filter_type: option.clone(),
            });
        }
    }

    Ok(Some(FilterContext {
        name: name.to_string(),
        filter_type: generator.filter_type(qualifier)?,
        verbose,
        comment: filter.header.comment.clone(),
    }))
}

/// Applies platform selection, expiration and `stateless_reply` rules.
fn keep_term(term: &Term, platform: Platform, filter: &str, options: &RenderOptions) -> bool {
    if !term.platform.is_empty() && !term.platform.iter().any(|p| p == platform.as_ref()) {
        debug!("Term {} is not for {}; skipping", term.name, platform);
        return false;
    }
    if term.platform_exclude.iter().any(|p| p == platform.as_ref()) {
        debug!("Term {} excludes {}; skipping", term.name, platform);
        return false;
    }

    if let Some(expiration) = term.expiration {
        if expiration < options.today {
            warn!(
                "Term {} in filter {} is expired and will not be rendered",
                term.name, filter
            );
            return false;
        }
        let horizon = options.today + TimeDelta::weeks(i64::from(options.exp_info_weeks));
        if expiration <= horizon {
            info!(
                "Term {} in filter {} expires in less than {} weeks",
                term.name, filter, options.exp_info_weeks
            );
        }
    }

    if term.stateless_reply {
        warn!(
            "Term {} in filter {} is a stateless reply term and will not be rendered",
            term.name, filter
        );
        return false;
    }

    true
}

/// Which side of a flow an address or port list applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

/// A term's address fields resolved to networks, excludes applied.
///
/// `None` means the field was absent (matches any); `Some(vec![])` means
/// every network was excluded or the name resolved to nothing.
#[derive(Debug, Clone)]
pub struct ResolvedTerm<'a> {
    pub term: &'a Term,
    pub address: Option<Vec<IpNetwork>>,
    pub source: Option<Vec<IpNetwork>>,
    pub destination: Option<Vec<IpNetwork>>,
}

impl<'a> ResolvedTerm<'a> {
    /// Resolves `address`, `source_address` and `destination_address`, in
    /// that order, each name exactly once.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedName`] from the naming collaborator, or
    /// [`Error::InvalidAddress`] for a bad literal in a `translated` term.
    pub fn resolve(term: &'a Term, naming: &dyn Naming) -> Result<Self> {
        Ok(Self {
            term,
            address: resolve_field(term, &term.address, &[], naming)?,
            source: resolve_field(
                term,
                &term.source_address,
                &term.source_address_exclude,
                naming,
            )?,
            destination: resolve_field(
                term,
                &term.destination_address,
                &term.destination_address_exclude,
                naming,
            )?,
        })
    }

    /// Networks of `side` in `family`: `None` for "any".
    pub fn side(&self, side: Side, family: AddressFamily) -> Option<Vec<IpNetwork>> {
        let networks = match side {
            Side::Source => self.source.as_ref(),
            Side::Destination => self.destination.as_ref(),
        }?;
        Some(in_family(networks, family))
    }

    /// Networks of the `address` token in `family`.
    pub fn address(&self, family: AddressFamily) -> Option<Vec<IpNetwork>> {
        self.address.as_ref().map(|nets| in_family(nets, family))
    }

    /// Returns `true` when some address field has no network in `family`,
    /// so the term matches nothing there.
    pub fn is_empty_in(&self, family: AddressFamily) -> bool {
        [&self.address, &self.source, &self.destination]
            .into_iter()
            .flatten()
            .any(|nets| in_family(nets, family).is_empty())
    }
}

fn in_family(networks: &[IpNetwork], family: AddressFamily) -> Vec<IpNetwork> {
    networks
        .iter()
        .filter(|net| family.contains(net))
        .copied()
        .collect()
}

fn resolve_field(
    term: &Term,
    names: &[String],
    excludes: &[String],
    naming: &dyn Naming,
) -> Result<Option<Vec<IpNetwork>>> {
    if names.is_empty() {
        return Ok(None);
    }
    let networks = resolve_names(term, names, naming)?;
    let excluded = resolve_names(term, excludes, naming)?;
    Ok(Some(address::exclude(&networks, &excluded)))
}

fn resolve_names(term: &Term, names: &[String], naming: &dyn Naming) -> Result<Vec<IpNetwork>> {
    let mut networks = Vec::new();
    for name in names {
        if term.translated {
            networks.push(address::parse_literal(name)?);
        } else {
            networks.extend(naming.resolve_address(name)?.into_iter().map(address::normalize));
        }
    }
    Ok(address::dedup(networks))
}

/// Resolves the services of `side` for one protocol, deduplicated in
/// first-seen order. Returns an empty list when the term has no ports on
/// that side.
///
/// # Errors
///
/// [`Error::UnresolvedName`] from the naming collaborator, or
/// [`Error::InvalidPort`] for malformed port specs.
pub fn resolve_ports(
    term: &Term,
    side: Side,
    protocol: &str,
    naming: &dyn Naming,
) -> Result<Vec<PortRange>> {
    let services = match side {
        Side::Source => &term.source_port,
        Side::Destination => &term.destination_port,
    };

    let mut ports: Vec<PortRange> = Vec::new();
    for service in services {
        let specs = if term.translated {
            vec![service.clone()]
        } else {
            naming.resolve_service(service, protocol)?
        };
        for spec in specs {
            let range = PortRange::parse(&spec)?;
            if !ports.contains(&range) {
                ports.push(range);
            }
        }
    }
    Ok(ports)
}

/// Ports of both sides for each protocol, resolved once per protocol in
/// term order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolPorts {
    pub protocol: String,
    pub source: Vec<PortRange>,
    pub destination: Vec<PortRange>,
}

/// Resolves every protocol's ports, source side first.
///
/// A protocol for which a side's services define no ports is left out of
/// the result: rendering it without a port match would widen the term.
/// Callers must treat an empty result for a term that lists protocols as
/// "nothing to render", never as "any protocol".
///
/// # Errors
///
/// [`Error::InvalidTerm`] when ports are given without a protocol, plus the
/// errors of [`resolve_ports`].
pub fn resolve_protocol_ports(term: &Term, naming: &dyn Naming) -> Result<Vec<ProtocolPorts>> {
    let has_ports = !term.source_port.is_empty() || !term.destination_port.is_empty();
    if has_ports && term.protocol.is_empty() {
        return Err(Error::InvalidTerm {
            term: term.name.clone(),
            reason: "ports require a protocol".to_string(),
        });
    }

    let mut resolved = Vec::with_capacity(term.protocol.len());
    for protocol in &term.protocol {
        let source = resolve_ports(term, Side::Source, protocol, naming)?;
        let destination = resolve_ports(term, Side::Destination, protocol, naming)?;
        if (!term.source_port.is_empty() && source.is_empty())
            || (!term.destination_port.is_empty() && destination.is_empty())
        {
            warn!(
                "Term {} has no {} ports in its services; skipping {} for this term",
                term.name, protocol, protocol
            );
            continue;
        }
        resolved.push(ProtocolPorts {
            protocol: protocol.clone(),
            source,
            destination,
        });
    }
    Ok(resolved)
}

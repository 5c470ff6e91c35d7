//! Core rendering functionality
//!
//! This module contains the policy model and the backends that turn it into
//! platform configuration. It provides:
//!
//! - [`policy`]: The policy object graph (filters, headers, terms)
//! - [`tokens`]: Token support tables and term validation
//! - [`generator`]: The backend contract and the shared render pipeline
//! - [`arista`]: Arista EOS text ACLs
//! - [`openconfig`]: OpenConfig structured ACL documents
//! - [`naming`]: Symbolic address/service resolution
//! - [`protocols`]: Protocol numbers, ICMP types and port ranges
//! - [`address`]: Prefix list helpers
//! - [`error`]: Error types for rendering operations

pub mod address;
pub mod arista;
pub mod error;
pub mod generator;
pub mod naming;
pub mod openconfig;
pub mod policy;
pub mod protocols;
pub mod tokens;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;

use crate::core::arista::Arista;
use crate::core::error::Result;
use crate::core::generator::{Generator, RenderOptions};
use crate::core::naming::Naming;
use crate::core::openconfig::OpenConfig;
use crate::core::policy::{Platform, Policy};
use crate::core::tokens::TokenDeclaration;

/// Renders `policy` for `platform` and returns the artifact text.
///
/// # Errors
///
/// Any error of [`Generator::render_with`]; no text is produced on failure.
pub fn render_platform(
    platform: Platform,
    policy: &Policy,
    naming: &dyn Naming,
    options: &RenderOptions,
) -> Result<String> {
    match platform {
        Platform::Arista => Ok(Arista::new()
            .render_with(policy, naming, options)?
            .to_string()),
        Platform::OpenConfig => {
            let acl = OpenConfig::new().render_with(policy, naming, options)?;
            let mut json = acl.to_json()?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Returns the token declaration of `platform`'s backend.
pub fn platform_tokens(platform: Platform) -> TokenDeclaration {
    match platform {
        Platform::Arista => Arista::new().build_tokens(),
        Platform::OpenConfig => OpenConfig::new().build_tokens(),
    }
}

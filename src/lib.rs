//! aclgen - network ACL generator
//!
//! Compiles a vendor-neutral access-control policy into exact configuration
//! artifacts for network devices.
//!
//! # Architecture
//!
//! - [`core`] - Policy model, token validation, render pipeline and backends
//! - [`validators`] - Remark sanitization and filter name validation
//! - [`config`] - Configuration loading
//! - [`utils`] - Utility functions (XDG directories, atomic writes, checksums)
//!
//! # Guarantees
//!
//! - A render either returns a complete artifact or an error, never a
//!   partial one
//! - Equal input renders byte-identical output
//! - Terms are never reordered or merged
//! - Artifacts are written atomically

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::generator::{Generator, RenderOptions};
pub use core::naming::{Definitions, Naming};
pub use core::policy::{Platform, Policy, Term};

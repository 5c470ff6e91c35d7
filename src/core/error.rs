use thiserror::Error;

/// Core error types for aclgen
///
/// Every variant is fatal to the render of the enclosing policy: a backend
/// returns either a complete artifact or one of these.
#[derive(Debug, Error)]
pub enum Error {
    /// Term uses a policy field the backend does not declare
    #[error("term '{term}' uses unsupported token '{token}' for platform {platform}")]
    UnsupportedToken {
        term: String,
        token: String,
        platform: String,
    },

    /// Term uses a declared field with a value the backend does not permit
    #[error("term '{term}' uses unsupported {token} value '{value}' for platform {platform}")]
    UnsupportedSubToken {
        term: String,
        token: String,
        value: String,
        platform: String,
    },

    /// `tcp-established` combined with a protocol other than tcp
    #[error("term '{term}' uses tcp-established with non-tcp protocols: {protocols}")]
    TcpEstablishedWithNonTcp { term: String, protocols: String },

    /// Naming collaborator could not resolve a symbolic name
    #[error("unresolved {kind} name '{name}'")]
    UnresolvedName { kind: NameKind, name: String },

    /// Header qualifier the backend does not understand
    #[error("unsupported filter type '{filter_type}' for platform {platform}")]
    UnsupportedFilterType {
        platform: String,
        filter_type: String,
    },

    /// Protocol name with no IANA number
    #[error("term '{term}' uses unknown protocol '{protocol}'")]
    UnknownProtocol { term: String, protocol: String },

    /// ICMP type name not defined for the address family being rendered
    #[error("term '{term}' uses icmp type '{icmp_type}' which is not valid for {family}")]
    UnknownIcmpType {
        term: String,
        icmp_type: String,
        family: String,
    },

    /// Malformed port or port range
    #[error("invalid port specification '{0}'")]
    InvalidPort(String),

    /// Malformed literal address
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// Term combines fields in a way the backend cannot express
    #[error("term '{term}': {reason}")]
    InvalidTerm { term: String, reason: String },

    /// Filter name that cannot be used on the target platform
    #[error("invalid filter name '{name}': {reason}")]
    InvalidFilterName { name: String, reason: String },

    /// Naming definitions could not be loaded
    #[error("definitions error in {source_name} line {line}: {message}")]
    Definitions {
        source_name: String,
        line: usize,
        message: String,
    },

    /// Configuration file is malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which namespace a symbolic name was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum NameKind {
    #[strum(serialize = "address")]
    Address,
    #[strum(serialize = "service")]
    Service,
}

impl Error {
    /// Returns an actionable hint for errors a policy author can fix.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::UnsupportedToken {
                token, platform, ..
            } => Some(format!(
                "remove '{token}' from the term, or exclude the term with platform-exclude:: {platform}"
            )),
            Error::UnsupportedSubToken { token, .. } => Some(format!(
                "run `aclgen tokens <backend>` to list the permitted {token} values"
            )),
            Error::TcpEstablishedWithNonTcp { .. } => Some(
                "split the term: keep tcp-established on a tcp-only term and move the other protocols to a separate term"
                    .to_string(),
            ),
            Error::UnresolvedName { kind, name } => Some(format!(
                "define {name} in the {} definitions",
                match kind {
                    NameKind::Address => ".net",
                    NameKind::Service => ".svc",
                }
            )),
            Error::UnsupportedFilterType { platform, .. } => Some(match platform.as_str() {
                "arista" => "arista accepts: standard, extended, inet, inet6, mixed, noverbose"
                    .to_string(),
                "openconfig" => "openconfig accepts: inet, inet6, mixed, noverbose".to_string(),
                _ => "check the target options of the header".to_string(),
            }),
            Error::InvalidPort(_) => {
                Some("ports are 0-65535; ranges are written low-high with low <= high".to_string())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

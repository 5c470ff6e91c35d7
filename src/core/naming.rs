//! Symbolic name resolution
//!
//! Backends never see raw definition files. They ask a [`Naming`]
//! implementation for the networks behind an address name and the port
//! specs behind a service name for one protocol.
//!
//! [`Definitions`] is the production implementation. It reads `.net` and
//! `.svc` files in the usual definitions layout:
//!
//! ```text
//! RFC1918 = 10.0.0.0/8      # comments run to end of line
//!           172.16.0.0/12
//!           192.168.0.0/16
//! INTERNAL = RFC1918        # names nest
//!
//! DNS = 53/tcp 53/udp
//! HIGH_PORTS = 1024-65535/tcp 1024-65535/udp
//! ```
//!
//! Indented lines continue the previous definition. Nested names are
//! expanded on lookup, so definition order does not matter.

use crate::core::address;
use crate::core::error::{Error, NameKind, Result};
use crate::core::protocols::PortRange;
use ipnetwork::IpNetwork;
use logos::Logos;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Resolves symbolic address and service names.
pub trait Naming {
    /// Returns every network behind `name`, nested names expanded.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedName`] when `name` (or a name it references) is
    /// undefined.
    fn resolve_address(&self, name: &str) -> Result<Vec<IpNetwork>>;

    /// Returns the port specs (`"53"`, `"1024-65535"`) behind `name` for
    /// `protocol`. An empty list means the service has no ports for that
    /// protocol.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedName`] when `name` is undefined.
    fn resolve_service(&self, name: &str, protocol: &str) -> Result<Vec<String>>;
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
enum Lexeme<'src> {
    #[token("=")]
    Equals,

    #[regex(r"[A-Za-z0-9_.:/\-]+", |lex| lex.slice())]
    Word(&'src str),
}

#[derive(Debug, Clone)]
struct Definition {
    source_name: String,
    line: usize,
    values: Vec<String>,
}

/// Address and service definitions loaded from text.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    networks: HashMap<String, Definition>,
    services: HashMap<String, Definition>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.net` and `*.svc` file in `dir`, in file name order.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be read, or
    /// [`Error::Definitions`] for a malformed file.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut definitions = Self::new();
        for path in paths {
            let source_name = path.display().to_string();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("net") => {
                    definitions.add_networks(&source_name, &std::fs::read_to_string(&path)?)?;
                }
                Some("svc") => {
                    definitions.add_services(&source_name, &std::fs::read_to_string(&path)?)?;
                }
                _ => {}
            }
        }
        debug!(
            "Loaded {} network and {} service definitions from {}",
            definitions.networks.len(),
            definitions.services.len(),
            dir.display()
        );
        Ok(definitions)
    }

    /// Adds network definitions parsed from `text`.
    ///
    /// # Errors
    ///
    /// [`Error::Definitions`] for syntax errors or a value that is neither
    /// a prefix nor a name.
    pub fn add_networks(&mut self, source_name: &str, text: &str) -> Result<()> {
        for (name, definition) in parse(source_name, text)? {
            for value in &definition.values {
                if value.contains('/') && value.parse::<IpNetwork>().is_err() {
                    return Err(Error::Definitions {
                        source_name: source_name.to_string(),
                        line: definition.line,
                        message: format!("'{value}' is not a valid network"),
                    });
                }
            }
            self.networks.insert(name, definition);
        }
        Ok(())
    }

    /// Adds service definitions parsed from `text`.
    ///
    /// # Errors
    ///
    /// [`Error::Definitions`] for syntax errors or a malformed `port/proto`.
    pub fn add_services(&mut self, source_name: &str, text: &str) -> Result<()> {
        for (name, definition) in parse(source_name, text)? {
            for value in &definition.values {
                if let Some((port, protocol)) = value.split_once('/')
                    && (protocol.is_empty() || PortRange::parse(port).is_err())
                {
                    return Err(Error::Definitions {
                        source_name: source_name.to_string(),
                        line: definition.line,
                        message: format!("'{value}' is not a valid port/protocol pair"),
                    });
                }
            }
            self.services.insert(name, definition);
        }
        Ok(())
    }

    fn expand_networks(&self, name: &str, stack: &mut Vec<String>) -> Result<Vec<IpNetwork>> {
        let definition = self.networks.get(name).ok_or_else(|| Error::UnresolvedName {
            kind: NameKind::Address,
            name: name.to_string(),
        })?;
        enter(name, definition, stack)?;

        let mut networks = Vec::new();
        for value in &definition.values {
            match value.parse::<IpNetwork>() {
                Ok(network) => networks.push(address::normalize(network)),
                Err(_) => networks.extend(self.expand_networks(value, stack)?),
            }
        }
        stack.pop();
        Ok(networks)
    }

    fn expand_services(
        &self,
        name: &str,
        protocol: &str,
        stack: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let definition = self.services.get(name).ok_or_else(|| Error::UnresolvedName {
            kind: NameKind::Service,
            name: name.to_string(),
        })?;
        enter(name, definition, stack)?;

        let mut ports = Vec::new();
        for value in &definition.values {
            match value.split_once('/') {
                Some((port, proto)) => {
                    if proto == protocol {
                        ports.push(port.to_string());
                    }
                }
                None => ports.extend(self.expand_services(value, protocol, stack)?),
            }
        }
        stack.pop();
        Ok(ports)
    }
}

impl Naming for Definitions {
    fn resolve_address(&self, name: &str) -> Result<Vec<IpNetwork>> {
        let networks = self.expand_networks(name, &mut Vec::new())?;
        Ok(address::dedup(networks))
    }

    fn resolve_service(&self, name: &str, protocol: &str) -> Result<Vec<String>> {
        let mut ports = self.expand_services(name, protocol, &mut Vec::new())?;
        let mut seen = Vec::with_capacity(ports.len());
        ports.retain(|port| {
            if seen.contains(port) {
                false
            } else {
                seen.push(port.clone());
                true
            }
        });
        Ok(ports)
    }
}

/// Pushes `name` onto the expansion stack, failing on a reference cycle.
fn enter(name: &str, definition: &Definition, stack: &mut Vec<String>) -> Result<()> {
    if stack.iter().any(|seen| seen == name) {
        let mut chain = stack.clone();
        chain.push(name.to_string());
        return Err(Error::Definitions {
            source_name: definition.source_name.clone(),
            line: definition.line,
            message: format!("cyclic reference {}", chain.join(" -> ")),
        });
    }
    stack.push(name.to_string());
    Ok(())
}

/// Splits definition text into `(name, definition)` pairs in file order.
fn parse(source_name: &str, text: &str) -> Result<Vec<(String, Definition)>> {
    let mut definitions: Vec<(String, Definition)> = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw_line.split('#').next().unwrap_or_default();
        let syntax_error = |message: String| Error::Definitions {
            source_name: source_name.to_string(),
            line,
            message,
        };

        let mut lexemes = Vec::new();
        let mut lexer = Lexeme::lexer(content);
        while let Some(lexeme) = lexer.next() {
            match lexeme {
                Ok(lexeme) => lexemes.push(lexeme),
                Err(()) => {
                    return Err(syntax_error(format!(
                        "unexpected character(s) '{}'",
                        lexer.slice()
                    )));
                }
            }
        }

        match lexemes.as_slice() {
            [] => {}
            [Lexeme::Word(name), Lexeme::Equals, rest @ ..] => {
                let values = words(rest).map_err(syntax_error)?;
                if definitions.iter().any(|(existing, _)| existing == name) {
                    return Err(syntax_error(format!("'{name}' is defined twice")));
                }
                definitions.push((
                    (*name).to_string(),
                    Definition {
                        source_name: source_name.to_string(),
                        line,
                        values,
                    },
                ));
            }
            rest => {
                let values = words(rest).map_err(syntax_error)?;
                let Some((_, current)) = definitions.last_mut() else {
                    return Err(syntax_error(
                        "values before the first definition".to_string(),
                    ));
                };
                current.values.extend(values);
            }
        }
    }

    Ok(definitions)
}

fn words(lexemes: &[Lexeme<'_>]) -> std::result::Result<Vec<String>, String> {
    lexemes
        .iter()
        .map(|lexeme| match lexeme {
            Lexeme::Word(word) => Ok((*word).to_string()),
            Lexeme::Equals => Err("unexpected '='".to_string()),
        })
        .collect()
}

//! Image reference resolution.
//!
//! A reference is written as `<transport>://<locator>`. The transport is
//! optional; a bare locator such as `alpine:latest` is a library reference.
//! Everything in this module is pure: no I/O and no global state.

use std::fmt;

use thiserror::Error;

pub const LIBRARY_PROTOCOL: &str = "library";
pub const SHUB_PROTOCOL: &str = "shub";
pub const HTTP_PROTOCOL: &str = "http";
pub const HTTPS_PROTOCOL: &str = "https";

const SEPARATOR: &str = "://";

const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error, PartialEq)]
pub enum ReferenceError {
    #[error("bad uri {0}")]
    EmptyLocator(String),
}

/// Source protocol of a reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transport {
    Library,
    Hub,
    Http,
    Https,
    /// Any other tag. Handled by the registry strategy.
    Other(String),
}

impl Transport {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "" | LIBRARY_PROTOCOL => Transport::Library,
            SHUB_PROTOCOL => Transport::Hub,
            HTTP_PROTOCOL => Transport::Http,
            HTTPS_PROTOCOL => Transport::Https,
            other => Transport::Other(other.to_string()),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Library => TransportKind::Library,
            Transport::Hub => TransportKind::Hub,
            Transport::Http | Transport::Https => TransportKind::Http,
            Transport::Other(_) => TransportKind::Registry,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Library => f.write_str(LIBRARY_PROTOCOL),
            Transport::Hub => f.write_str(SHUB_PROTOCOL),
            Transport::Http => f.write_str(HTTP_PROTOCOL),
            Transport::Https => f.write_str(HTTPS_PROTOCOL),
            Transport::Other(tag) => f.write_str(tag),
        }
    }
}

/// Handling strategy selected for a transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportKind {
    Library,
    Hub,
    Http,
    Registry,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Library => "library",
            TransportKind::Hub => "hub",
            TransportKind::Http => "http",
            TransportKind::Registry => "registry",
        })
    }
}

/// A resolved reference. The locator is never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageReference {
    transport: Transport,
    locator: String,
    raw: String,
    explicit_transport: bool,
}

impl ImageReference {
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let (tag, locator) = split(raw);

        if locator.is_empty() {
            return Err(ReferenceError::EmptyLocator(raw.to_string()));
        }

        Ok(ImageReference {
            transport: Transport::from_tag(tag.unwrap_or_default()),
            locator: locator.to_string(),
            raw: raw.to_string(),
            explicit_transport: tag.is_some_and(|t| !t.is_empty()),
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The string exactly as the user wrote it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Default local file name for this reference.
    ///
    /// An untagged reference is named as if it were `library://`.
    pub fn derived_name(&self) -> String {
        let naming = if self.explicit_transport {
            &self.transport
        } else {
            &Transport::Library
        };

        match naming {
            Transport::Http | Transport::Https => url_file_name(&self.locator),
            _ => name_and_tag(&self.locator),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.transport, self.locator)
    }
}

/// Split `raw` into an optional transport tag and the locator.
pub fn split(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(SEPARATOR) {
        Some((tag, locator)) => (Some(tag), locator),
        None => (None, raw),
    }
}

/// Pick the destination name for a pull.
///
/// Priority: explicit `--name`, then the first positional argument when a
/// name was given in front of the source, then the derived name.
pub fn destination_name(
    reference: &ImageReference,
    name_override: Option<&str>,
    positional_name: Option<&str>,
) -> String {
    name_override
        .filter(|n| !n.is_empty())
        .or(positional_name)
        .map(str::to_owned)
        .unwrap_or_else(|| reference.derived_name())
}

/// `org/project:tag@sha256:...` becomes `project_tag`.
fn name_and_tag(locator: &str) -> String {
    let base = locator
        .rsplit_once('@')
        .map(|(base, _)| base)
        .unwrap_or(locator);

    // A `:` followed by a `/` belongs to a host:port, not to a tag.
    let (base, tag) = match base.rsplit_once(':') {
        Some((_, tag)) if tag.contains('/') => (base, DEFAULT_TAG),
        Some((base, "")) => (base, DEFAULT_TAG),
        Some((base, tag)) => (base, tag),
        None => (base, DEFAULT_TAG),
    };

    let name = base
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    format!("{name}_{tag}")
}

/// Last path segment of `host/path/file.sif?query`.
fn url_file_name(locator: &str) -> String {
    let without_query = locator
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    match without_query.split_once('/') {
        Some((_, path)) if !path.is_empty() => path
            .rsplit('/')
            .next()
            .unwrap_or(path)
            .to_string(),
        _ => without_query.to_string(),
    }
}

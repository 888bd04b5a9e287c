//! Key pattern grammar.
//!
//! ```text
//! attrs.*                   every declared attribute (declares none itself)
//! attrs.<name>[:<Hint>]     one attribute, formatted according to <Hint>
//! req.headers.<name>        one request header
//! res.headers.<name>        one response header
//! <key>                     one built-in property, by exact key
//! <prefix>*                 built-ins whose key starts with <prefix>
//! *<suffix>                 built-ins whose key ends with <suffix>
//! *<substr>*                built-ins whose key contains <substr>
//! ```

use crate::attribute::AttributeKey;
use crate::{ExportError, ExportResult};
use std::str::FromStr;

/// Namespace of user-defined attributes.
pub const ATTRS_PREFIX: &str = "attrs.";
/// Namespace of exported request headers.
pub const REQ_HEADERS_PREFIX: &str = "req.headers.";
/// Namespace of exported response headers.
pub const RES_HEADERS_PREFIX: &str = "res.headers.";

const WILDCARD: char = '*';

/// A parsed key pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Exactly one built-in property.
    Exact(String),
    /// Built-ins whose key starts with the prefix (`req.*`).
    Prefix(String),
    /// Built-ins whose key ends with the suffix (`*_length`).
    Suffix(String),
    /// Built-ins whose key contains the substring (`*rpc*`).
    Contains(String),
    /// A request header, by lowercased name.
    RequestHeader(String),
    /// A response header, by lowercased name.
    ResponseHeader(String),
    /// A concrete attribute declaration.
    Attribute(AttributeKey),
    /// `attrs.*`
    AllAttributes,
}

impl KeyPattern {
    /// Does this pattern select the built-in property with `key`?
    ///
    /// Always `false` for header and attribute patterns.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(k) => key == k,
            Self::Prefix(p) => key.starts_with(p.as_str()),
            Self::Suffix(s) => key.ends_with(s.as_str()),
            Self::Contains(s) => key.contains(s.as_str()),
            _ => false,
        }
    }

    /// Whether this is a wildcard over built-in keys.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Prefix(_) | Self::Suffix(_) | Self::Contains(_))
    }
}

impl FromStr for KeyPattern {
    type Err = ExportError;

    fn from_str(pattern: &str) -> ExportResult<Self> {
        if pattern.is_empty() {
            return Err(ExportError::invalid(pattern, "pattern is empty"));
        }
        if pattern.contains(char::is_whitespace) {
            return Err(ExportError::invalid(pattern, "pattern contains whitespace"));
        }

        if let Some(decl) = pattern.strip_prefix(ATTRS_PREFIX) {
            if decl == "*" {
                return Ok(Self::AllAttributes);
            }
            return AttributeKey::parse_declaration(decl)
                .map(Self::Attribute)
                .map_err(|reason| ExportError::invalid(pattern, reason));
        }
        if let Some(name) = pattern.strip_prefix(REQ_HEADERS_PREFIX) {
            return header_name(pattern, name).map(Self::RequestHeader);
        }
        if let Some(name) = pattern.strip_prefix(RES_HEADERS_PREFIX) {
            return header_name(pattern, name).map(Self::ResponseHeader);
        }

        let leading = pattern.starts_with(WILDCARD);
        let trailing = pattern.len() > 1 && pattern.ends_with(WILDCARD);
        let start = usize::from(leading);
        let end = pattern.len() - usize::from(trailing);
        let core = &pattern[start..end];
        if core.contains(WILDCARD) {
            return Err(ExportError::invalid(
                pattern,
                "'*' is only allowed at the start or the end",
            ));
        }

        Ok(match (leading, trailing) {
            (false, false) => Self::Exact(core.to_string()),
            (false, true) => Self::Prefix(core.to_string()),
            (true, false) => Self::Suffix(core.to_string()),
            (true, true) => Self::Contains(core.to_string()),
        })
    }
}

fn header_name(pattern: &str, name: &str) -> ExportResult<String> {
    if name.is_empty() {
        return Err(ExportError::invalid(pattern, "header name is empty"));
    }
    if name.contains(WILDCARD) {
        return Err(ExportError::invalid(
            pattern,
            "header names must be concrete; wildcards are not supported",
        ));
    }
    Ok(name.to_ascii_lowercase())
}

//! Attribute keys and the stringifiers that format their values.

use reqlog_core::ExtractError;
use serde_json::Value;

/// A user-defined attribute selected for export.
///
/// The type hint is an opaque tag carried through to export time, where it
/// picks the [`Stringifier`] used to format the attribute's value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeKey {
    name: String,
    type_hint: Option<String>,
}

impl AttributeKey {
    pub fn new(name: impl Into<String>, type_hint: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_hint,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_hint(&self) -> Option<&str> {
        self.type_hint.as_deref()
    }

    /// The key this attribute is exported under: `attrs.<name>`.
    pub fn export_key(&self) -> String {
        format!("{}{}", crate::ATTRS_PREFIX, self.name)
    }

    /// Parse the part of an attribute declaration after `attrs.`:
    /// `<name>` or `<name>:<TypeHint>`.
    pub(crate) fn parse_declaration(decl: &str) -> Result<Self, &'static str> {
        let (name, type_hint) = match decl.split_once(':') {
            Some((name, hint)) => (name, Some(hint)),
            None => (decl, None),
        };
        if name.is_empty() {
            return Err("attribute name is empty");
        }
        if name.contains('*') {
            return Err("attribute names cannot contain '*'; use 'attrs.*' on its own");
        }
        if let Some(hint) = type_hint {
            if hint.is_empty() {
                return Err("type hint after ':' is empty");
            }
            if hint.contains(':') || hint.contains('*') {
                return Err("type hint cannot contain ':' or '*'");
            }
        }
        Ok(Self::new(name, type_hint.map(String::from)))
    }
}

impl std::fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.type_hint {
            Some(hint) => write!(f, "{}{}:{}", crate::ATTRS_PREFIX, self.name, hint),
            None => write!(f, "{}{}", crate::ATTRS_PREFIX, self.name),
        }
    }
}

/// Formats an attribute value for a log field.
pub type Stringifier = fn(&Value) -> Result<String, ExtractError>;

/// The stringifier for a type hint.
///
/// Recognised hints (case-insensitive): `String`/`Str`, `Int`/`Long`,
/// `Float`/`Double`, `Bool`/`Boolean`, `Json`. Anything else, or no hint,
/// falls back to the default formatting: strings verbatim, everything else
/// as compact JSON.
pub fn builtin_stringifier(type_hint: Option<&str>) -> Stringifier {
    let Some(hint) = type_hint else {
        return stringify_default;
    };
    match hint.to_ascii_lowercase().as_str() {
        "string" | "str" => stringify_string,
        "int" | "integer" | "long" => stringify_integer,
        "float" | "double" => stringify_float,
        "bool" | "boolean" => stringify_bool,
        "json" => stringify_json,
        _ => stringify_default,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn stringify_default(value: &Value) -> Result<String, ExtractError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn stringify_string(value: &Value) -> Result<String, ExtractError> {
    value
        .as_str()
        .map(String::from)
        .ok_or(ExtractError::TypeMismatch {
            expected: "string",
            found: kind(value),
        })
}

fn stringify_integer(value: &Value) -> Result<String, ExtractError> {
    value
        .as_i64()
        .map(|n| n.to_string())
        .or_else(|| value.as_u64().map(|n| n.to_string()))
        .ok_or(ExtractError::TypeMismatch {
            expected: "integer",
            found: kind(value),
        })
}

fn stringify_float(value: &Value) -> Result<String, ExtractError> {
    value
        .as_f64()
        .map(|n| n.to_string())
        .ok_or(ExtractError::TypeMismatch {
            expected: "number",
            found: kind(value),
        })
}

fn stringify_bool(value: &Value) -> Result<String, ExtractError> {
    value
        .as_bool()
        .map(|b| b.to_string())
        .ok_or(ExtractError::TypeMismatch {
            expected: "boolean",
            found: kind(value),
        })
}

fn stringify_json(value: &Value) -> Result<String, ExtractError> {
    Ok(serde_json::to_string(value)?)
}

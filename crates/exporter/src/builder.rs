//! Builder that resolves key patterns into an export selection.
//!
//! Built-in selections are kept as one presence slot per catalog entry, so
//! the resulting order is always catalog order no matter in which order
//! (or how many times) patterns were added.

use crate::attribute::{AttributeKey, Stringifier, builtin_stringifier};
use crate::exporter::RequestContextExporter;
use crate::pattern::KeyPattern;
use crate::{ExportError, ExportResult};
use reqlog_core::BuiltInProperty;
use std::collections::HashMap;
use tracing::debug;

/// Accumulates key patterns at configuration time.
///
/// Not meant for concurrent use; build it once at startup and share the
/// resulting [`RequestContextExporter`].
#[derive(Debug, Clone)]
pub struct RequestContextExporterBuilder {
    catalog: &'static [BuiltInProperty],
    /// One slot per catalog index.
    selected: Vec<bool>,
    attributes: Vec<AttributeKey>,
    all_attributes: bool,
    request_headers: Vec<String>,
    response_headers: Vec<String>,
    key_prefix: String,
    stringifiers: HashMap<String, Stringifier>,
}

impl Default for RequestContextExporterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContextExporterBuilder {
    /// A builder over the standard catalog, [`BuiltInProperty::ALL`].
    pub fn new() -> Self {
        Self::with_catalog(BuiltInProperty::ALL)
    }

    /// A builder over a custom catalog.
    pub fn with_catalog(catalog: &'static [BuiltInProperty]) -> Self {
        Self {
            catalog,
            selected: vec![false; catalog.len()],
            attributes: Vec::new(),
            all_attributes: false,
            request_headers: Vec::new(),
            response_headers: Vec::new(),
            key_prefix: String::new(),
            stringifiers: HashMap::new(),
        }
    }

    /// Parse and add one key pattern.
    ///
    /// On error the builder is left exactly as it was.
    pub fn add_key_pattern(&mut self, pattern: &str) -> ExportResult<&mut Self> {
        let parsed: KeyPattern = pattern.parse()?;
        self.add(parsed, pattern)?;
        Ok(self)
    }

    /// Add every pattern in order, stopping at the first invalid one.
    ///
    /// Patterns added before the failing one stay added.
    pub fn add_key_patterns<I, S>(&mut self, patterns: I) -> ExportResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.add_key_pattern(pattern.as_ref())?;
        }
        Ok(self)
    }

    /// Prefix prepended to every exported key (e.g. `ctx.`).
    pub fn key_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Format attributes with `type_hint` using `stringifier` instead of the
    /// built-in formatting for that hint.
    pub fn stringifier(
        &mut self,
        type_hint: impl Into<String>,
        stringifier: Stringifier,
    ) -> &mut Self {
        self.stringifiers.insert(type_hint.into(), stringifier);
        self
    }

    fn add(&mut self, pattern: KeyPattern, raw: &str) -> ExportResult<()> {
        match pattern {
            KeyPattern::Exact(key) => {
                let index = self
                    .catalog
                    .iter()
                    .position(|p| p.key == key)
                    .ok_or_else(|| ExportError::invalid(raw, "unknown built-in key"))?;
                self.selected[index] = true;
            }
            ref wildcard @ (KeyPattern::Prefix(_)
            | KeyPattern::Suffix(_)
            | KeyPattern::Contains(_)) => {
                let mut matched = 0;
                for (slot, property) in self.selected.iter_mut().zip(self.catalog) {
                    if wildcard.matches(property.key) {
                        *slot = true;
                        matched += 1;
                    }
                }
                if matched == 0 {
                    debug!(pattern = raw, "Key pattern matched no built-in properties");
                }
            }
            KeyPattern::RequestHeader(name) => push_unique(&mut self.request_headers, name),
            KeyPattern::ResponseHeader(name) => push_unique(&mut self.response_headers, name),
            KeyPattern::Attribute(key) => {
                // First declaration of a name wins.
                if let Some(existing) = self.attributes.iter().find(|a| a.name() == key.name()) {
                    if existing.type_hint() != key.type_hint() {
                        debug!(
                            attribute = key.name(),
                            kept = ?existing.type_hint(),
                            ignored = ?key.type_hint(),
                            "Attribute already declared with a different type hint"
                        );
                    }
                } else {
                    self.attributes.push(key);
                }
            }
            KeyPattern::AllAttributes => self.all_attributes = true,
        }
        Ok(())
    }

    /// Currently selected built-ins, in catalog order.
    pub fn built_ins(&self) -> impl Iterator<Item = &'static BuiltInProperty> + '_ {
        let catalog = self.catalog;
        self.selected
            .iter()
            .zip(catalog)
            .filter(|(selected, _)| **selected)
            .map(|(_, property)| property)
    }

    /// Declared attributes, in declaration order.
    pub fn attributes(&self) -> &[AttributeKey] {
        &self.attributes
    }

    pub fn request_headers(&self) -> &[String] {
        &self.request_headers
    }

    pub fn response_headers(&self) -> &[String] {
        &self.response_headers
    }

    /// Whether `attrs.*` was added.
    pub fn exports_all_attributes(&self) -> bool {
        self.all_attributes
    }

    /// Freeze the current selection into an exporter.
    ///
    /// The builder is left untouched, so building twice without adding
    /// patterns in between yields equal exporters.
    pub fn build(&self) -> RequestContextExporter {
        let stringifiers = self
            .attributes
            .iter()
            .map(|key| {
                key.type_hint()
                    .and_then(|hint| self.stringifiers.get(hint).copied())
                    .unwrap_or_else(|| builtin_stringifier(key.type_hint()))
            })
            .collect();

        RequestContextExporter::new(
            self.built_ins().collect(),
            self.request_headers.clone(),
            self.response_headers.clone(),
            self.attributes.clone(),
            stringifiers,
            self.all_attributes,
            self.key_prefix.clone(),
        )
    }
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqlog_core::ExtractError;

    fn all() -> &'static [BuiltInProperty] {
        BuiltInProperty::ALL
    }

    fn keys<'a>(props: impl IntoIterator<Item = &'a BuiltInProperty>) -> Vec<&'static str> {
        props.into_iter().map(|p| p.key).collect()
    }

    fn expected(filter: impl Fn(&str) -> bool) -> Vec<&'static str> {
        all().iter().map(|p| p.key).filter(|k| filter(k)).collect()
    }

    #[test]
    fn add_built_in_properties() {
        let mut builder = RequestContextExporterBuilder::new();
        for property in all() {
            builder.add_key_pattern(property.key).unwrap();
        }
        assert_eq!(keys(builder.built_ins()), keys(all()));
        assert_eq!(keys(builder.build().built_ins().iter().copied()), keys(all()));
    }

    #[test]
    fn add_built_in_properties_in_reverse() {
        let mut builder = RequestContextExporterBuilder::new();
        for property in all().iter().rev() {
            builder.add_key_pattern(property.key).unwrap();
        }
        assert_eq!(keys(builder.built_ins()), keys(all()));
    }

    #[test]
    fn each_key_selects_exactly_itself() {
        for property in all() {
            let mut builder = RequestContextExporterBuilder::new();
            builder.add_key_pattern(property.key).unwrap();
            assert_eq!(builder.build().built_ins(), [property]);
        }
    }

    #[test]
    fn add_without_wildcards() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("remote.host").unwrap();
        assert_eq!(keys(builder.built_ins()), ["remote.host"]);
        assert_eq!(keys(builder.build().built_ins().iter().copied()), ["remote.host"]);
    }

    #[test]
    fn add_with_prefix_wildcard() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("req.*").unwrap();
        let want = expected(|k| k.starts_with("req."));
        assert!(!want.is_empty());
        assert_eq!(keys(builder.built_ins()), want);
        assert_eq!(keys(builder.build().built_ins().iter().copied()), want);
    }

    #[test]
    fn add_with_contains_wildcard() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("*rpc*").unwrap();
        let want = expected(|k| k.contains("rpc"));
        assert_eq!(want, ["req.rpc_method", "req.rpc_params", "res.rpc_result"]);
        assert_eq!(keys(builder.built_ins()), want);
        assert_eq!(keys(builder.build().built_ins().iter().copied()), want);
    }

    #[test]
    fn add_with_suffix_wildcard() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("*_length").unwrap();
        assert_eq!(
            keys(builder.built_ins()),
            ["req.content_length", "res.content_length"]
        );
    }

    #[test]
    fn pattern_order_does_not_change_selection() {
        let patterns = ["tls.cipher", "*rpc*", "remote.*", "req.method", "*_length"];

        let mut forward = RequestContextExporterBuilder::new();
        forward.add_key_patterns(patterns).unwrap();
        let mut reverse = RequestContextExporterBuilder::new();
        reverse.add_key_patterns(patterns.iter().rev()).unwrap();

        assert_eq!(keys(forward.built_ins()), keys(reverse.built_ins()));
        assert_eq!(forward.build(), reverse.build());

        // Catalog order, not declaration order.
        let selected = keys(forward.built_ins());
        let positions: Vec<usize> = selected
            .iter()
            .map(|k| all().iter().position(|p| p.key == *k).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn overlapping_and_repeated_patterns_do_not_duplicate() {
        let mut builder = RequestContextExporterBuilder::new();
        builder
            .add_key_patterns(["req.*", "req.*", "req.method", "*method*", "req.method"])
            .unwrap();
        assert_eq!(keys(builder.built_ins()), expected(|k| k.starts_with("req.")));
    }

    #[test]
    fn empty_wildcard_match_is_not_an_error() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("nothing.*").unwrap();
        builder.add_key_pattern("*zzz*").unwrap();
        assert_eq!(builder.built_ins().count(), 0);
        assert!(builder.build().is_empty());
    }

    #[test]
    fn unknown_exact_key_fails_and_leaves_state_unchanged() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_patterns(["req.method", "attrs.id:String"]).unwrap();
        let before = builder.build();

        let err = builder.add_key_pattern("req.nonexistent").unwrap_err();
        assert_eq!(
            err,
            ExportError::InvalidPattern {
                pattern: "req.nonexistent".into(),
                reason: "unknown built-in key".into(),
            }
        );
        assert_eq!(builder.build(), before);
        assert_eq!(keys(builder.built_ins()), ["req.method"]);
    }

    #[test]
    fn malformed_pattern_fails_naming_the_pattern() {
        let mut builder = RequestContextExporterBuilder::new();
        let err = builder.add_key_pattern("req.*.path").unwrap_err();
        assert!(err.to_string().contains("req.*.path"));
        assert_eq!(builder.built_ins().count(), 0);
    }

    #[test]
    fn add_key_patterns_stops_at_first_error() {
        let mut builder = RequestContextExporterBuilder::new();
        let result = builder.add_key_patterns(["scheme", "bogus", "req.method"]);
        assert!(result.is_err());
        assert_eq!(keys(builder.built_ins()), ["scheme"]);
    }

    #[test]
    fn attribute_wildcard_alone_declares_nothing() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("attrs.*").unwrap();
        assert!(builder.attributes().is_empty());
        assert!(builder.exports_all_attributes());
        assert!(builder.build().attributes().is_empty());
    }

    #[test]
    fn add_attr_with_wildcard() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("attrs.*").unwrap();
        builder.add_key_pattern("attrs.my_attrs:MyAttribute").unwrap();
        assert_eq!(builder.attributes().len(), 1);
        assert_eq!(builder.build().attributes().len(), 1);
        assert_eq!(builder.attributes()[0].name(), "my_attrs");
    }

    #[test]
    fn attr_without_wildcard_has_same_count() {
        let mut builder = RequestContextExporterBuilder::new();
        builder.add_key_pattern("attrs.my_attrs:MyAttribute").unwrap();
        assert_eq!(builder.attributes().len(), 1);
        assert!(!builder.exports_all_attributes());
    }

    #[test]
    fn first_type_hint_wins() {
        let mut builder = RequestContextExporterBuilder::new();
        builder
            .add_key_patterns(["attrs.id:Int", "attrs.id:String", "attrs.id"])
            .unwrap();
        assert_eq!(builder.attributes(), [AttributeKey::new("id", Some("Int".into()))]);
    }

    #[test]
    fn attributes_keep_declaration_order() {
        let mut builder = RequestContextExporterBuilder::new();
        builder
            .add_key_patterns(["attrs.b:String", "attrs.a:String", "attrs.c"])
            .unwrap();
        let names: Vec<_> = builder.attributes().iter().map(|a| a.name()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn headers_are_deduplicated() {
        let mut builder = RequestContextExporterBuilder::new();
        builder
            .add_key_patterns([
                "req.headers.user-agent",
                "req.headers.User-Agent",
                "res.headers.content-type",
            ])
            .unwrap();
        assert_eq!(builder.request_headers(), ["user-agent"]);
        assert_eq!(builder.response_headers(), ["content-type"]);
    }

    #[test]
    fn build_twice_is_equal() {
        let mut builder = RequestContextExporterBuilder::new();
        builder
            .add_key_patterns(["req.*", "attrs.*", "attrs.id:String", "req.headers.host"])
            .unwrap();
        builder.key_prefix("ctx.");
        assert_eq!(builder.build(), builder.build());
    }

    static TINY: &[BuiltInProperty] = &[
        BuiltInProperty::new("a.one", |_| Ok(Some("1".into()))),
        BuiltInProperty::new("b.two", |_| Ok(None)),
        BuiltInProperty::new("a.three", |_| Err(ExtractError::Unavailable("test".into()))),
    ];

    #[test]
    fn custom_catalog() {
        let mut builder = RequestContextExporterBuilder::with_catalog(TINY);
        builder.add_key_pattern("a.*").unwrap();
        assert_eq!(keys(builder.built_ins()), ["a.one", "a.three"]);
        assert!(builder.add_key_pattern("req.method").is_err());
    }
}

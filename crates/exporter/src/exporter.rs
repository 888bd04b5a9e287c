//! The immutable, request-time exporter.

use crate::attribute::{AttributeKey, Stringifier};
use crate::builder::RequestContextExporterBuilder;
use crate::fields::ExportedFields;
use crate::pattern::{REQ_HEADERS_PREFIX, RES_HEADERS_PREFIX};
use crate::ExportResult;
use reqlog_core::{BuiltInProperty, ExtractError, RequestContext};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a request context into a flat map of log fields.
///
/// Immutable once built. Clones share the same selection, so one exporter
/// can be handed to every request handler without locking.
#[derive(Clone)]
pub struct RequestContextExporter {
    inner: Arc<Inner>,
}

struct Inner {
    built_ins: Vec<&'static BuiltInProperty>,
    request_headers: Vec<String>,
    response_headers: Vec<String>,
    attributes: Vec<AttributeKey>,
    /// Parallel to `attributes`.
    stringifiers: Vec<Stringifier>,
    all_attributes: bool,
    key_prefix: String,
}

impl RequestContextExporter {
    pub fn builder() -> RequestContextExporterBuilder {
        RequestContextExporterBuilder::new()
    }

    /// Build an exporter straight from a list of key patterns.
    pub fn from_patterns<I, S>(patterns: I) -> ExportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::builder().add_key_patterns(patterns)?.build())
    }

    pub(crate) fn new(
        built_ins: Vec<&'static BuiltInProperty>,
        request_headers: Vec<String>,
        response_headers: Vec<String>,
        attributes: Vec<AttributeKey>,
        stringifiers: Vec<Stringifier>,
        all_attributes: bool,
        key_prefix: String,
    ) -> Self {
        debug_assert_eq!(attributes.len(), stringifiers.len());
        info!(
            built_ins = built_ins.len(),
            headers = request_headers.len() + response_headers.len(),
            attributes = attributes.len(),
            "Request context exporter built"
        );
        Self {
            inner: Arc::new(Inner {
                built_ins,
                request_headers,
                response_headers,
                attributes,
                stringifiers,
                all_attributes,
                key_prefix,
            }),
        }
    }

    /// Selected built-in properties, in catalog order.
    pub fn built_ins(&self) -> &[&'static BuiltInProperty] {
        &self.inner.built_ins
    }

    /// Declared attributes, in declaration order.
    pub fn attributes(&self) -> &[AttributeKey] {
        &self.inner.attributes
    }

    /// The declared attribute called `name`.
    pub fn attribute(&self, name: &str) -> Option<&AttributeKey> {
        self.inner.attributes.iter().find(|a| a.name() == name)
    }

    pub fn request_headers(&self) -> &[String] {
        &self.inner.request_headers
    }

    pub fn response_headers(&self) -> &[String] {
        &self.inner.response_headers
    }

    /// Whether `attrs.*` was part of the configuration.
    pub fn exports_all_attributes(&self) -> bool {
        self.inner.all_attributes
    }

    pub fn key_prefix(&self) -> &str {
        &self.inner.key_prefix
    }

    /// Whether this exporter would never export anything.
    pub fn is_empty(&self) -> bool {
        self.inner.built_ins.is_empty()
            && self.inner.request_headers.is_empty()
            && self.inner.response_headers.is_empty()
            && self.inner.attributes.is_empty()
    }

    /// Export the selected fields of `ctx`.
    ///
    /// Best effort: absent values are skipped, and a field that fails to
    /// extract is skipped too without affecting the others. Never fails.
    pub fn export(&self, ctx: &RequestContext) -> ExportedFields {
        let inner = &*self.inner;
        let mut fields = ExportedFields::with_capacity(
            inner.built_ins.len()
                + inner.request_headers.len()
                + inner.response_headers.len()
                + inner.attributes.len(),
        );

        for property in &inner.built_ins {
            match property.extract(ctx) {
                Ok(Some(value)) => fields.push(self.key(property.key), value),
                Ok(None) => {}
                Err(e) => extraction_failed(ctx, property.key, &e),
            }
        }

        for name in &inner.request_headers {
            if let Some(value) = ctx.request.headers.get(name) {
                fields.push(self.key(&format!("{REQ_HEADERS_PREFIX}{name}")), value);
            }
        }

        for name in &inner.response_headers {
            if let Some(value) = ctx.with_response(|res| res.headers.get(name)).flatten() {
                fields.push(self.key(&format!("{RES_HEADERS_PREFIX}{name}")), value);
            }
        }

        for (attr, stringify) in inner.attributes.iter().zip(&inner.stringifiers) {
            let formatted = ctx
                .attrs()
                .get(attr.name())
                .and_then(|value| value.map(|v| stringify(&v)).transpose());
            match formatted {
                Ok(Some(value)) => fields.push(self.key(&attr.export_key()), value),
                Ok(None) => {}
                Err(e) => extraction_failed(ctx, &attr.export_key(), &e),
            }
        }

        fields
    }

    fn key(&self, key: &str) -> String {
        if self.inner.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.inner.key_prefix, key)
        }
    }
}

fn extraction_failed(ctx: &RequestContext, key: &str, error: &ExtractError) {
    debug!(request_id = %ctx.id, key, error = %error, "Skipping field that failed to export");
}

impl PartialEq for RequestContextExporter {
    /// Equal when both export the same keys and format every attribute
    /// with the same stringifier.
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&*self.inner, &*other.inner);
        a.built_ins == b.built_ins
            && a.request_headers == b.request_headers
            && a.response_headers == b.response_headers
            && a.attributes == b.attributes
            && a.all_attributes == b.all_attributes
            && a.key_prefix == b.key_prefix
            && a.stringifiers.len() == b.stringifiers.len()
            && a
                .stringifiers
                .iter()
                .zip(&b.stringifiers)
                .all(|(x, y)| std::ptr::fn_addr_eq(*x, *y))
    }
}

impl std::fmt::Debug for RequestContextExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = &*self.inner;
        f.debug_struct("RequestContextExporter")
            .field("built_ins", &inner.built_ins)
            .field("request_headers", &inner.request_headers)
            .field("response_headers", &inner.response_headers)
            .field("attributes", &inner.attributes)
            .field("all_attributes", &inner.all_attributes)
            .field("key_prefix", &inner.key_prefix)
            .finish()
    }
}

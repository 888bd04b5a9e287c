//! Built-in properties — the fixed catalog of well-known context fields.
//!
//! Each entry pairs a dotted key with the function that extracts its value
//! from a [`RequestContext`]. The declaration order of [`BuiltInProperty::ALL`]
//! is the canonical export order.

use crate::context::RequestContext;
use crate::error::ExtractResult;

/// Extracts one property value from a context.
pub type Extractor = fn(&RequestContext) -> ExtractResult;

/// A named, orderable catalog entry.
#[derive(Clone, Copy)]
pub struct BuiltInProperty {
    /// Dotted key, e.g. `req.method`.
    pub key: &'static str,
    extractor: Extractor,
}

impl BuiltInProperty {
    pub const fn new(key: &'static str, extractor: Extractor) -> Self {
        Self { key, extractor }
    }

    /// Extract this property's value from `ctx`.
    pub fn extract(&self, ctx: &RequestContext) -> ExtractResult {
        (self.extractor)(ctx)
    }

    /// Look up a catalog entry by its exact key.
    pub fn find(key: &str) -> Option<&'static BuiltInProperty> {
        Self::ALL.iter().find(|p| p.key == key)
    }

    /// The full catalog, in canonical order.
    pub const ALL: &'static [BuiltInProperty] = &[
        BuiltInProperty::new("elapsed_nanos", elapsed_nanos),
        BuiltInProperty::new("local.host", |ctx| Ok(ctx.local_host.clone())),
        BuiltInProperty::new("local.ip", |ctx| Ok(ctx.local_addr.map(|a| a.ip().to_string()))),
        BuiltInProperty::new("local.port", |ctx| Ok(ctx.local_addr.map(|a| a.port().to_string()))),
        BuiltInProperty::new("remote.host", |ctx| Ok(ctx.remote_host.clone())),
        BuiltInProperty::new("remote.ip", |ctx| Ok(ctx.remote_addr.map(|a| a.ip().to_string()))),
        BuiltInProperty::new("remote.port", |ctx| {
            Ok(ctx.remote_addr.map(|a| a.port().to_string()))
        }),
        BuiltInProperty::new("client.ip", client_ip),
        BuiltInProperty::new("scheme", |ctx| Ok(Some(ctx.scheme.clone()))),
        BuiltInProperty::new("req.name", |ctx| Ok(ctx.name.clone())),
        BuiltInProperty::new("req.service_name", service_name),
        BuiltInProperty::new("req.direction", |ctx| Ok(Some(ctx.direction.to_string()))),
        BuiltInProperty::new("req.authority", authority),
        BuiltInProperty::new("req.id", |ctx| Ok(Some(ctx.id.to_string()))),
        BuiltInProperty::new("req.path", |ctx| Ok(Some(ctx.request.path.clone()))),
        BuiltInProperty::new("req.query", |ctx| Ok(ctx.request.query.clone())),
        BuiltInProperty::new("req.method", |ctx| Ok(Some(ctx.request.method.clone()))),
        BuiltInProperty::new("req.content_length", |ctx| {
            Ok(ctx.request.content_length.map(|n| n.to_string()))
        }),
        BuiltInProperty::new("req.content", |ctx| Ok(ctx.request.content.clone())),
        BuiltInProperty::new("req.rpc_method", |ctx| {
            Ok(ctx.request.rpc.as_ref().map(|rpc| rpc.method.clone()))
        }),
        BuiltInProperty::new("req.rpc_params", rpc_params),
        BuiltInProperty::new("res.status_code", |ctx| {
            Ok(ctx.with_response(|res| res.status.to_string()))
        }),
        BuiltInProperty::new("res.content_length", |ctx| {
            Ok(ctx
                .with_response(|res| res.content_length.map(|n| n.to_string()))
                .flatten())
        }),
        BuiltInProperty::new("res.content", |ctx| {
            Ok(ctx.with_response(|res| res.content.clone()).flatten())
        }),
        BuiltInProperty::new("res.rpc_result", rpc_result),
        BuiltInProperty::new("tls.session_id", |ctx| {
            Ok(ctx.tls.as_ref().and_then(|tls| tls.session_id.clone()))
        }),
        BuiltInProperty::new("tls.proto", |ctx| {
            Ok(ctx.tls.as_ref().map(|tls| tls.protocol.clone()))
        }),
        BuiltInProperty::new("tls.cipher", |ctx| {
            Ok(ctx.tls.as_ref().map(|tls| tls.cipher.clone()))
        }),
    ];
}

impl PartialEq for BuiltInProperty {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for BuiltInProperty {}

impl std::fmt::Debug for BuiltInProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BuiltInProperty").field(&self.key).finish()
    }
}

impl std::fmt::Display for BuiltInProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key)
    }
}

// ── Extractors ────────────────────────────────────────────────────────────

fn elapsed_nanos(ctx: &RequestContext) -> ExtractResult {
    // `None` on overflow (~292 years) or a start time in the future.
    Ok(ctx
        .elapsed()
        .num_nanoseconds()
        .filter(|n| *n >= 0)
        .map(|n| n.to_string()))
}

fn client_ip(ctx: &RequestContext) -> ExtractResult {
    Ok(ctx
        .client_ip
        .or_else(|| ctx.remote_addr.map(|a| a.ip()))
        .map(|ip| ip.to_string()))
}

fn service_name(ctx: &RequestContext) -> ExtractResult {
    Ok(ctx
        .service_name
        .clone()
        .or_else(|| ctx.request.rpc.as_ref().map(|rpc| rpc.service.clone())))
}

fn authority(ctx: &RequestContext) -> ExtractResult {
    Ok(ctx
        .request
        .authority
        .clone()
        .or_else(|| ctx.request.headers.get("host")))
}

fn rpc_params(ctx: &RequestContext) -> ExtractResult {
    match &ctx.request.rpc {
        Some(rpc) if !rpc.params.is_null() => Ok(Some(serde_json::to_string(&rpc.params)?)),
        _ => Ok(None),
    }
}

fn rpc_result(ctx: &RequestContext) -> ExtractResult {
    let result = ctx.with_response(|res| res.rpc_result.as_ref().map(serde_json::to_string));
    match result.flatten() {
        Some(json) => Ok(Some(json?)),
        None => Ok(None),
    }
}

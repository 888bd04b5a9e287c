//! Request context exporting — selects context fields for log enrichment.
//!
//! Callers declare, ahead of time, which fields of a request's context are
//! exported whenever that request logs. Declarations are *key patterns*:
//!
//! - an exact built-in key, e.g. `req.method`
//! - a wildcard over built-in keys: `req.*`, `*_length`, `*rpc*`
//! - a request or response header: `req.headers.user-agent`
//! - a user-defined attribute with a type hint: `attrs.request_id:String`
//! - the attribute wildcard `attrs.*`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  add_key_pattern  ┌─────────────┐  build  ┌──────────────┐
//! │ config / API │──────────────────▶│   Builder   │────────▶│   Exporter   │
//! └──────────────┘                   └─────────────┘         └──────┬───────┘
//!                                                                   │ export(ctx)
//!                                                            ┌──────▼───────┐
//!                                                            │ExportedFields│
//!                                                            └──────────────┘
//! ```
//!
//! Patterns are resolved once, at configuration time. The built
//! [`RequestContextExporter`] is immutable and shared by every request.
//!
//! # Example
//!
//! ```
//! use reqlog_core::{RequestContext, RequestHead};
//! use reqlog_exporter::RequestContextExporter;
//!
//! let mut builder = RequestContextExporter::builder();
//! builder.add_key_pattern("req.method")?.add_key_pattern("attrs.request_id:String")?;
//! let exporter = builder.build();
//!
//! let ctx = RequestContext::server("http", RequestHead::new("GET", "/health"));
//! ctx.set_attr("request_id", "4f2a");
//! let fields = exporter.export(&ctx);
//! assert_eq!(fields.get("req.method"), Some("GET"));
//! assert_eq!(fields.get("attrs.request_id"), Some("4f2a"));
//! # Ok::<(), reqlog_exporter::ExportError>(())
//! ```

mod attribute;
mod builder;
mod exporter;
mod fields;
mod pattern;

pub use attribute::{AttributeKey, Stringifier, builtin_stringifier};
pub use builder::RequestContextExporterBuilder;
pub use exporter::RequestContextExporter;
pub use fields::ExportedFields;
pub use pattern::{ATTRS_PREFIX, KeyPattern, REQ_HEADERS_PREFIX, RES_HEADERS_PREFIX};

/// Result of configuring an exporter.
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Errors from the export configuration surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl ExportError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

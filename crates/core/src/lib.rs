//! # reqlog Core
//!
//! Request context model and the built-in property catalog for reqlog.
//! This crate knows nothing about key patterns or exporters — it defines
//! the per-request state that exporters read from and the fixed set of
//! well-known fields they can select.
//!
//! ## Design Philosophy
//!
//! - The catalog is a static, ordered table of `(key, extractor)` pairs.
//!   Its declaration order is the canonical export order.
//! - Extraction never panics. Absence is `Ok(None)`; anything that goes
//!   wrong is an [`ExtractError`] for the caller to recover from.

pub mod context;
pub mod error;
pub mod property;

// Re-export key types at crate root for ergonomics
pub use context::{
    AttributeStore, Direction, Headers, RequestContext, RequestHead, ResponseHead, RpcCall,
    TlsInfo,
};
pub use error::{ExtractError, ExtractResult};
pub use property::{BuiltInProperty, Extractor};

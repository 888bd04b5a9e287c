//! Request context — the per-request state that exporters read from.
//!
//! A [`RequestContext`] is created when a request arrives (or is sent),
//! collects user-defined attributes while it is being handled, and is
//! completed once the response is known. Completion and attribute writes
//! may happen on a different thread than the one that later exports the
//! context, so both are guarded.

use crate::error::ExtractError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use uuid::Uuid;

// ── Heads ─────────────────────────────────────────────────────────────────

/// Which side of the exchange this context belongs to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// A request received by a server.
    #[default]
    Server,
    /// A request sent by a client.
    Client,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Ordered, case-insensitive header multi-map.
///
/// Names are stored lowercased. Repeated headers keep every value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// All values for `name`, joined with `,`.  `None` if the header is absent.
    pub fn get(&self, name: &str) -> Option<String> {
        let mut values = self
            .0
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str());
        let first = values.next()?;
        Some(values.fold(first.to_string(), |mut acc, v| {
            acc.push(',');
            acc.push_str(v);
            acc
        }))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// An RPC invocation carried by the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcCall {
    /// Fully qualified service name (e.g. `grpc.testing.TestService`).
    pub service: String,
    /// Method name (e.g. `UnaryCall`).
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Request metadata known as soon as the request starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub content_length: Option<u64>,
    /// Content preview, if content previewing is enabled.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub rpc: Option<RpcCall>,
}

impl RequestHead {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the content preview and its length.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.content_length = Some(content.len() as u64);
        self.content = Some(content);
        self
    }

    pub fn with_rpc(
        mut self,
        service: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> Self {
        self.rpc = Some(RpcCall {
            service: service.into(),
            method: method.into(),
            params,
        });
        self
    }
}

/// Response metadata, only known once the request completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseHead {
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub rpc_result: Option<Value>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the content preview and its length.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.content_length = Some(content.len() as u64);
        self.content = Some(content);
        self
    }

    pub fn with_rpc_result(mut self, result: Value) -> Self {
        self.rpc_result = Some(result);
        self
    }
}

/// Negotiated TLS session parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsInfo {
    #[serde(default)]
    pub session_id: Option<String>,
    /// e.g. `TLSv1.3`
    pub protocol: String,
    /// e.g. `TLS_AES_128_GCM_SHA256`
    pub cipher: String,
}

// ── Attribute store ───────────────────────────────────────────────────────

/// Thread-safe store of user-defined per-request attributes.
#[derive(Debug, Default)]
pub struct AttributeStore {
    values: RwLock<HashMap<String, Value>>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, returning the previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into())
    }

    /// Current value of an attribute.
    ///
    /// A poisoned store is reported instead of read, since a writer
    /// panicked halfway through an update.
    pub fn get(&self, name: &str) -> Result<Option<Value>, ExtractError> {
        let values = self
            .values
            .read()
            .map_err(|_| ExtractError::Unavailable("attribute store poisoned".into()))?;
        Ok(values.get(name).cloned())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Context ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Completion {
    response: ResponseHead,
    completed_at: DateTime<Utc>,
}

/// The context of a single in-flight request.
#[derive(Debug)]
pub struct RequestContext {
    pub id: Uuid,
    pub direction: Direction,
    /// Session scheme, e.g. `http`, `https`, `gproto+h2`.
    pub scheme: String,
    pub service_name: Option<String>,
    /// Logical name of the request (RPC method name or route).
    pub name: Option<String>,
    pub local_addr: Option<SocketAddr>,
    pub local_host: Option<String>,
    pub remote_addr: Option<SocketAddr>,
    pub remote_host: Option<String>,
    /// Originating client IP (e.g. resolved from `X-Forwarded-For`).
    pub client_ip: Option<IpAddr>,
    pub request: RequestHead,
    pub tls: Option<TlsInfo>,
    pub started_at: DateTime<Utc>,
    completion: RwLock<Option<Completion>>,
    attrs: AttributeStore,
}

impl RequestContext {
    /// Create a context for a request that starts now.
    pub fn new(direction: Direction, scheme: impl Into<String>, request: RequestHead) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction,
            scheme: scheme.into(),
            service_name: None,
            name: None,
            local_addr: None,
            local_host: None,
            remote_addr: None,
            remote_host: None,
            client_ip: None,
            request,
            tls: None,
            started_at: Utc::now(),
            completion: RwLock::new(None),
            attrs: AttributeStore::new(),
        }
    }

    /// Shorthand for a server-side context.
    pub fn server(scheme: impl Into<String>, request: RequestHead) -> Self {
        Self::new(Direction::Server, scheme, request)
    }

    /// Shorthand for a client-side context.
    pub fn client(scheme: impl Into<String>, request: RequestHead) -> Self {
        Self::new(Direction::Client, scheme, request)
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_local(mut self, addr: SocketAddr, host: Option<String>) -> Self {
        self.local_addr = Some(addr);
        self.local_host = host;
        self
    }

    pub fn with_remote(mut self, addr: SocketAddr, host: Option<String>) -> Self {
        self.remote_addr = Some(addr);
        self.remote_host = host;
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_tls(mut self, tls: TlsInfo) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Record the response.  Returns `false` if the context was already
    /// completed, in which case the first response is kept.
    pub fn complete(&self, response: ResponseHead) -> bool {
        self.complete_at(response, Utc::now())
    }

    /// [`complete`](Self::complete) with an explicit completion time.
    pub fn complete_at(&self, response: ResponseHead, completed_at: DateTime<Utc>) -> bool {
        let mut slot = self
            .completion
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::debug!(request_id = %self.id, "Request already completed, ignoring response");
            return false;
        }
        *slot = Some(Completion {
            response,
            completed_at,
        });
        true
    }

    pub fn is_complete(&self) -> bool {
        self.completion_slot().is_some()
    }

    /// Apply `f` to the response, if the request has completed.
    pub fn with_response<R>(&self, f: impl FnOnce(&ResponseHead) -> R) -> Option<R> {
        self.completion_slot().as_ref().map(|c| f(&c.response))
    }

    /// Time since the request started, up to completion if it has completed.
    pub fn elapsed(&self) -> chrono::Duration {
        let end = self
            .completion_slot()
            .as_ref()
            .map(|c| c.completed_at)
            .unwrap_or_else(Utc::now);
        end.signed_duration_since(self.started_at)
    }

    // The slot is only ever replaced whole, so a poisoned lock still holds
    // a consistent value.
    fn completion_slot(&self) -> RwLockReadGuard<'_, Option<Completion>> {
        self.completion
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The attribute store of this request.
    pub fn attrs(&self) -> &AttributeStore {
        &self.attrs
    }

    /// Shorthand for `self.attrs().set(..)`.
    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attrs.set(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn headers_are_case_insensitive_and_joined() {
        let headers = Headers::new()
            .with("Accept", "text/html")
            .with("X-Trace", "a")
            .with("x-trace", "b");
        assert_eq!(headers.get("accept").as_deref(), Some("text/html"));
        assert_eq!(headers.get("X-TRACE").as_deref(), Some("a,b"));
        assert_eq!(headers.get("missing"), None);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn headers_deserialize_from_pairs() {
        let headers: Headers = serde_json::from_value(json!([["user-agent", "curl/8"]])).unwrap();
        assert_eq!(headers.get("user-agent").as_deref(), Some("curl/8"));
    }

    #[test]
    fn content_sets_length() {
        let head = RequestHead::new("POST", "/upload").with_content("hello");
        assert_eq!(head.content_length, Some(5));
        assert_eq!(head.content.as_deref(), Some("hello"));
    }

    #[test]
    fn attribute_store_roundtrip() {
        let store = AttributeStore::new();
        assert!(store.is_empty());
        assert_eq!(store.set("request_id", "abc"), None);
        assert_eq!(store.get("request_id").unwrap(), Some(json!("abc")));
        assert!(store.contains("request_id"));
        assert_eq!(store.set("request_id", "def"), Some(json!("abc")));
        assert_eq!(store.remove("request_id"), Some(json!("def")));
        assert_eq!(store.get("request_id").unwrap(), None);
    }

    #[test]
    fn poisoned_store_reports_unavailable() {
        let ctx = Arc::new(RequestContext::server("http", RequestHead::new("GET", "/")));
        let poisoner = Arc::clone(&ctx);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.attrs.values.write().unwrap();
            panic!("poison the store");
        })
        .join();
        assert!(matches!(
            ctx.attrs().get("anything"),
            Err(ExtractError::Unavailable(_))
        ));
        // Writers still get through.
        ctx.set_attr("after", 1);
        assert!(ctx.attrs().contains("after"));
    }

    #[test]
    fn poisoned_completion_still_reads_consistently() {
        let ctx = Arc::new(RequestContext::server("http", RequestHead::new("GET", "/")));
        assert!(ctx.complete(ResponseHead::new(503)));
        let poisoner = Arc::clone(&ctx);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.completion.write().unwrap();
            panic!("poison the completion");
        })
        .join();
        assert!(ctx.completion.is_poisoned());

        assert!(ctx.is_complete());
        assert_eq!(ctx.with_response(|r| r.status), Some(503));
        assert!(ctx.elapsed() >= chrono::Duration::zero());
        assert!(!ctx.complete(ResponseHead::new(200)));
    }

    #[test]
    fn response_absent_until_completed() {
        let ctx = RequestContext::server("http", RequestHead::new("GET", "/"));
        assert!(!ctx.is_complete());
        assert_eq!(ctx.with_response(|r| r.status), None);

        assert!(ctx.complete(ResponseHead::new(204)));
        assert!(ctx.is_complete());
        assert_eq!(ctx.with_response(|r| r.status), Some(204));
    }

    #[test]
    fn first_completion_wins() {
        let ctx = RequestContext::server("http", RequestHead::new("GET", "/"));
        assert!(ctx.complete(ResponseHead::new(200)));
        assert!(!ctx.complete(ResponseHead::new(500)));
        assert_eq!(ctx.with_response(|r| r.status), Some(200));
    }

    #[test]
    fn elapsed_is_frozen_at_completion() {
        let start = Utc::now() - chrono::Duration::milliseconds(250);
        let ctx = RequestContext::server("http", RequestHead::new("GET", "/"))
            .with_started_at(start);
        ctx.complete_at(
            ResponseHead::new(200),
            start + chrono::Duration::milliseconds(100),
        );
        assert_eq!(ctx.elapsed().num_milliseconds(), 100);
    }

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Server.to_string(), "server");
        assert_eq!(Direction::Client.to_string(), "client");
    }
}

//! Export a request described in a JSON file.
//!
//! ```json
//! {
//!   "scheme": "https",
//!   "remote_addr": "10.0.0.7:52100",
//!   "request": { "method": "GET", "path": "/users/42",
//!                "headers": [["user-agent", "curl/8.5"]] },
//!   "response": { "status": 200 },
//!   "attrs": { "request_id": "7d1c" }
//! }
//! ```

use chrono::{DateTime, Utc};
use reqlog_config::AppConfig;
use reqlog_core::{Direction, RequestContext, RequestHead, ResponseHead, TlsInfo};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// On-disk description of one request.
#[derive(Debug, Deserialize)]
pub struct RequestFile {
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub local_addr: Option<SocketAddr>,
    #[serde(default)]
    pub local_host: Option<String>,
    #[serde(default)]
    pub remote_addr: Option<SocketAddr>,
    #[serde(default)]
    pub remote_host: Option<String>,
    #[serde(default)]
    pub client_ip: Option<IpAddr>,
    pub request: RequestHead,
    #[serde(default)]
    pub response: Option<ResponseHead>,
    #[serde(default)]
    pub tls: Option<TlsInfo>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

fn default_scheme() -> String {
    "http".into()
}

impl RequestFile {
    /// Build the context this file describes, completed if it has a response.
    pub fn into_context(self) -> RequestContext {
        let mut ctx = RequestContext::new(self.direction, self.scheme, self.request);
        ctx.service_name = self.service_name;
        ctx.name = self.name;
        ctx.local_addr = self.local_addr;
        ctx.local_host = self.local_host;
        ctx.remote_addr = self.remote_addr;
        ctx.remote_host = self.remote_host;
        ctx.client_ip = self.client_ip;
        ctx.tls = self.tls;
        if let Some(started_at) = self.started_at {
            ctx.started_at = started_at;
        }

        for (name, value) in self.attrs {
            ctx.set_attr(name, value);
        }

        if let Some(response) = self.response {
            ctx.complete_at(response, self.completed_at.unwrap_or_else(Utc::now));
        }
        ctx
    }
}

pub async fn run(
    config: &AppConfig,
    request: &Path,
    patterns: &[String],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let exporter = super::build_exporter(config, patterns)?;

    let content = tokio::fs::read_to_string(request).await?;
    let file: RequestFile = serde_json::from_str(&content)?;
    let ctx = file.into_context();

    let fields = exporter.export(&ctx);
    tracing::info!(request_id = %ctx.id, fields = %fields, "Exported request context");

    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        for (key, value) in fields.iter() {
            println!("{key}={value}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqlog_exporter::RequestContextExporter;

    const SAMPLE: &str = r#"{
        "scheme": "https",
        "remote_addr": "10.0.0.7:52100",
        "request": {
            "method": "POST",
            "path": "/grpc.testing.TestService/UnaryCall",
            "headers": [["user-agent", "grpc-java/1.30"]],
            "rpc": { "service": "grpc.testing.TestService", "method": "UnaryCall" }
        },
        "response": { "status": 200 },
        "started_at": "2026-01-01T00:00:00Z",
        "completed_at": "2026-01-01T00:00:00.250Z",
        "attrs": { "request_id": "7d1c", "retries": 2 }
    }"#;

    #[test]
    fn request_file_builds_completed_context() {
        let file: RequestFile = serde_json::from_str(SAMPLE).unwrap();
        let ctx = file.into_context();
        assert_eq!(ctx.direction, Direction::Server);
        assert!(ctx.is_complete());
        assert_eq!(ctx.elapsed().num_milliseconds(), 250);
        assert!(ctx.attrs().contains("retries"));
    }

    #[test]
    fn request_file_exports() {
        let file: RequestFile = serde_json::from_str(SAMPLE).unwrap();
        let ctx = file.into_context();
        let exporter = RequestContextExporter::from_patterns([
            "elapsed_nanos",
            "*rpc*",
            "res.status_code",
            "req.headers.user-agent",
            "attrs.request_id:String",
            "attrs.retries:Int",
        ])
        .unwrap();

        let fields = exporter.export(&ctx);
        assert_eq!(fields.get("elapsed_nanos"), Some("250000000"));
        assert_eq!(fields.get("req.rpc_method"), Some("UnaryCall"));
        // Null params and no result: both omitted.
        assert!(!fields.contains_key("req.rpc_params"));
        assert!(!fields.contains_key("res.rpc_result"));
        assert_eq!(fields.get("res.status_code"), Some("200"));
        assert_eq!(fields.get("req.headers.user-agent"), Some("grpc-java/1.30"));
        assert_eq!(fields.get("attrs.retries"), Some("2"));
    }

    #[test]
    fn minimal_request_file() {
        let file: RequestFile =
            serde_json::from_str(r#"{"request": {"method": "GET", "path": "/"}}"#).unwrap();
        let ctx = file.into_context();
        assert_eq!(ctx.scheme, "http");
        assert!(!ctx.is_complete());
    }
}

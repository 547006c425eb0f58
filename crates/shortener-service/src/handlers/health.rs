//! Health check handlers.
//!
//! Both probes are mounted without middleware so probe traffic stays out of
//! request logs and metrics.
//!
//! - `/v1/liveness`: process is up, plus build and pod details
//! - `/v1/readiness`: ready to take traffic

use crate::web::{handler_fn, respond, Handler};
use axum::http::StatusCode;
use serde::Serialize;
use std::env;

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub build: String,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "podIP", skip_serializing_if = "Option::is_none")]
    pub pod_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl LivenessResponse {
    /// Describe this process. Pod fields come from the Kubernetes downward
    /// API variables and are omitted when unset.
    pub fn current(build: &str) -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            status: "up",
            build: build.to_string(),
            host: non_empty("HOSTNAME").unwrap_or_else(|| "unavailable".to_string()),
            name: non_empty("KUBERNETES_NAME"),
            pod_ip: non_empty("KUBERNETES_POD_IP"),
            node: non_empty("KUBERNETES_NODE_NAME"),
            namespace: non_empty("KUBERNETES_NAMESPACE"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
}

/// Liveness probe handler.
///
/// Does NOT check any dependencies; failure means the process is hung.
pub fn liveness(build: String) -> Handler {
    handler_fn(move |scope, _req| {
        let data = LivenessResponse::current(&build);
        async move {
            tracing::debug!(target: "shortener.health", status = data.status, "liveness");
            respond(&scope, &data, StatusCode::OK)
        }
    })
}

/// Readiness probe handler.
pub fn readiness() -> Handler {
    handler_fn(|scope, _req| async move {
        let data = ReadinessResponse { status: "ok" };
        tracing::debug!(target: "shortener.health", status = data.status, "readiness");
        respond(&scope, &data, StatusCode::OK)
    })
}

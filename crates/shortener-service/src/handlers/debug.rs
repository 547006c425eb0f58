//! Runtime counters as JSON.

use crate::observability::{Metrics, MetricsSnapshot};
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// Handler for GET /debug/vars
#[tracing::instrument(skip_all, name = "shortener.debug.vars")]
pub async fn vars(State(metrics): State<Arc<Metrics>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

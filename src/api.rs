// src/api.rs
//! Process-level HTTP surface: liveness and metrics. Rate and subscription
//! routes live in a separate service.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::metrics::Metrics;

pub fn create_router(metrics: Option<&Metrics>) -> Router {
    let base = Router::new().route("/health", get(|| async { "OK" }));
    let router = match metrics {
        Some(m) => base.merge(m.router()),
        None => base,
    };
    router.layer(CorsLayer::very_permissive())
}

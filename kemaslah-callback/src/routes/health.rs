use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use kemaslah_shared::{HealthCheck, HealthResponse};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.store.ping() {
        Ok(()) => HealthCheck::healthy("database"),
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            HealthCheck::unhealthy("database", "unreachable")
        }
    };

    let response = HealthResponse::from_checks("kemaslah-callback", env!("CARGO_PKG_VERSION"), vec![database]);
    (response.status_code(), Json(response))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

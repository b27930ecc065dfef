use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Label used for requests that matched no route, so probes against random
/// paths cannot grow the label set.
const UNMATCHED_ROUTE: &str = "unmatched";

pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let response = next.run(req).await;

    let status = response.status();
    let labels = [
        ("method", method),
        ("route", route),
        ("status", status.as_u16().to_string()),
    ];

    counter!("callback_requests_total", &labels).increment(1);
    histogram!("callback_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
    if status.is_server_error() {
        counter!("callback_server_errors_total").increment(1);
    }

    response
}

/// Installs the process-wide Prometheus recorder. Only the first call in a
/// process succeeds.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
    routing::get,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static OBSERVABILITY_ENABLED: OnceLock<bool> = OnceLock::new();

/// `OBSERVABILITY_ENABLED`, on unless set to `false` or `0`.
pub fn is_observability_enabled() -> bool {
    *OBSERVABILITY_ENABLED.get_or_init(|| {
        std::env::var("OBSERVABILITY_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true)
    })
}

/// Installs the Prometheus recorder and its upkeep task.
pub fn init_metrics() -> Result<Option<PrometheusHandle>, BuildError> {
    if !is_observability_enabled() {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )?
        .install_recorder()?;

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            upkeep_handle.run_upkeep();
        }
    });

    Ok(Some(handle))
}

/// Label for the route a request hit. Unmatched paths collapse to one
/// value so probing random URLs cannot grow the label set.
pub fn route_label(matched: Option<&MatchedPath>, raw_path: &str) -> String {
    match matched {
        Some(path) => path.as_str().to_owned(),
        None if raw_path.starts_with("/api/") => "/api/{unmatched}".to_owned(),
        None => "{unmatched}".to_owned(),
    }
}

/// Keeps `http_requests_active` balanced even when the handler future is
/// dropped before completing.
struct ActiveRequest;

impl ActiveRequest {
    fn start() -> Self {
        gauge!("http_requests_active").increment(1.0);
        Self
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        gauge!("http_requests_active").decrement(1.0);
    }
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    if !is_observability_enabled() {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().as_str().to_owned();
    let path = route_label(req.extensions().get::<MatchedPath>(), req.uri().path());

    let _active = ActiveRequest::start();
    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method, "path" => path)
        .record(start.elapsed().as_secs_f64());

    response
}

pub fn metrics_app(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

pub fn track_user_created(role: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("users_created_total", "role" => role.to_string()).increment(1);
}

pub fn track_user_login_success(role: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("user_logins_total", "role" => role.to_string(), "status" => "success").increment(1);
}

pub fn track_user_login_failure(reason: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!(
        "user_logins_total",
        "role" => "unknown",
        "status" => "failure",
        "reason" => reason.to_string()
    )
    .increment(1);
}

pub fn track_enrollment(outcome: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("enrollments_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn track_withdrawal() {
    if !is_observability_enabled() {
        return;
    }
    counter!("withdrawals_total").increment(1);
}

pub fn track_message_sent(kind: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("messages_sent_total", "kind" => kind.to_string()).increment(1);
}

pub fn track_report_generated(kind: &str, status: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("reports_generated_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

pub fn set_realtime_connections(count: usize) {
    if !is_observability_enabled() {
        return;
    }
    gauge!("realtime_connections").set(count as f64);
}

pub fn track_rate_limited(budget: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("rate_limited_requests_total", "budget" => budget.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_paths_share_a_label() {
        assert_eq!(route_label(None, "/api/nope/123"), "/api/{unmatched}");
        assert_eq!(route_label(None, "/wp-admin"), "{unmatched}");
    }
}

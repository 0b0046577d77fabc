//! Prometheus Metrics
//!
//! Counters for account activity and relay health, plus the text-exposition
//! handler mounted at `/metrics` on both servers.

use axum::extract::{MatchedPath, Request};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, TextEncoder};

const REQUEST_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn int_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    let _ = prometheus::default_registry().register(Box::new(counter.clone()));
    counter
}

/// Accounts created through `/user/register`
pub static REGISTERED_USERS: Lazy<IntCounter> = Lazy::new(|| {
    int_counter(
        "number_of_registered_users",
        "The total number of registered users.",
    )
});

/// Favorite cakes served through `/user/me`
pub static CAKES_GIVEN: Lazy<IntCounter> = Lazy::new(|| {
    int_counter("number_of_cakes_given", "The total number of given cakes.")
});

/// Clients dropped by the hub for backpressure or a closed sink
pub static DROPPED_CLIENTS: Lazy<IntCounter> = Lazy::new(|| {
    int_counter(
        "relay_dropped_clients_total",
        "Clients dropped for a full or closed outbound queue.",
    )
});

/// WebSocket upgrades rejected before reaching the hub
pub static REJECTED_CONNECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    int_counter(
        "relay_rejected_connections_total",
        "Connection attempts rejected at authentication.",
    )
});

/// Bridge reconnect attempts after losing the broker
pub static BRIDGE_RECONNECTS: Lazy<IntCounter> = Lazy::new(|| {
    int_counter(
        "bridge_reconnects_total",
        "Reconnect attempts of the message-queue bridge.",
    )
});

/// Response-time histogram by route
static REQUEST_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "api_request_record_seconds",
            "Histogram of response time for handler in seconds.",
        )
        .buckets(REQUEST_BUCKETS.to_vec()),
        &["path"],
    )
    .expect("valid histogram definition");
    let _ = prometheus::default_registry().register(Box::new(histogram.clone()));
    histogram
});

/// Middleware recording per-route response times
pub async fn record_request(request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let timer = REQUEST_SECONDS.with_label_values(&[&path]).start_timer();
    let response = next.run(request).await;
    timer.observe_duration();
    response
}

/// GET /metrics
///
/// Prometheus text exposition of everything in the default registry.
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exposition_includes_touched_counters() {
        REGISTERED_USERS.inc();

        let response = metrics_handler().await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("number_of_registered_users"));
    }
}

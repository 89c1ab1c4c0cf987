//! Prometheus metrics helpers for notebridge.
//!
//! # Usage
//!
//! ```rust,ignore
//! use notebridge_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let handle = init_metrics()?;
//!     start_metrics_server(9091, handle).await?;
//!
//!     metrics::counter!("bridge_events_received_total").increment(1);
//!     Ok(())
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `bridge_`
//! - Suffix: unit or type (`_total` for counters)
//! - No per-event labels (event IDs and pubkeys would explode cardinality)

use crate::error::{Error, Result};
use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Counter: events received from the feed.
pub const EVENTS_RECEIVED: &str = "bridge_events_received_total";
/// Counter: events skipped because their ID was already delivered.
pub const EVENTS_DUPLICATE: &str = "bridge_events_duplicate_total";
/// Counter: events skipped because their author is not configured.
pub const EVENTS_UNKNOWN_AUTHOR: &str = "bridge_events_unknown_author_total";
/// Counter: events delivered to the webhook.
pub const EVENTS_DELIVERED: &str = "bridge_events_delivered_total";
/// Counter: failed webhook deliveries.
pub const DELIVERY_FAILURES: &str = "bridge_delivery_failures_total";
/// Counter: failed writes of the dedupe record.
pub const PERSIST_FAILURES: &str = "bridge_persist_failures_total";
/// Gauge: event IDs held by the dedupe store.
pub const DEDUPE_IDS: &str = "bridge_dedupe_ids";
/// Gauge: 1 while the ingest loop is running.
pub const RUNNING: &str = "bridge_running";

/// Install the Prometheus recorder and register metric descriptions.
///
/// The recorder is process-global; a second call returns an error.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Metrics(e.to_string()))?;

    register_bridge_metrics();

    Ok(handle)
}

/// Serve `/metrics` on the given port.
///
/// The listener is bound before returning so a port conflict surfaces at
/// startup; serving then continues on a background task.
pub async fn start_metrics_server(port: u16, handle: PrometheusHandle) -> Result<SocketAddr> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Metrics server listening on http://{}/metrics", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(local_addr)
}

fn register_bridge_metrics() {
    describe_counter!(EVENTS_RECEIVED, "Events received from the relay feed");
    describe_counter!(
        EVENTS_DUPLICATE,
        "Events skipped because they were already delivered"
    );
    describe_counter!(
        EVENTS_UNKNOWN_AUTHOR,
        "Events skipped because the author is not configured"
    );
    describe_counter!(EVENTS_DELIVERED, "Events delivered to the webhook");
    describe_counter!(DELIVERY_FAILURES, "Webhook deliveries that failed");
    describe_counter!(
        PERSIST_FAILURES,
        "Dedupe record writes that failed after a successful delivery"
    );
    describe_gauge!(DEDUPE_IDS, "Event IDs recorded in the dedupe store");
    describe_gauge!(RUNNING, "Whether the ingest loop is running (1=yes, 0=no)");
}

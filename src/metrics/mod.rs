//! Prometheus delivery metrics, labelled by subscriber id.
#[cfg(test)]
mod metrics_test;

use std::net::SocketAddr;
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::Result;

lazy_static! {
    pub static ref DELIVERED_FILES: IntCounterVec = IntCounterVec::new(
        Opts::new("delivered_files_total", "Files confirmed delivered"),
        &["subscriber"]
    )
    .expect("metric can not be created");

    pub static ref DELIVERY_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("delivery_failures_total", "Failed delivery attempts"),
        &["subscriber"]
    )
    .expect("metric can not be created");

    pub static ref BACKLOGGED_FILES: IntCounterVec = IntCounterVec::new(
        Opts::new("backlogged_files_total", "Entries written to the back-log"),
        &["subscriber"]
    )
    .expect("metric can not be created");

    pub static ref DROPPED_FILES: IntCounterVec = IntCounterVec::new(
        Opts::new("dropped_files_total", "Back-logged files found missing on storage"),
        &["subscriber"]
    )
    .expect("metric can not be created");

    pub static ref QUEUED_FILES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("queued_files", "Entries waiting in a delivery queue"),
        &["subscriber"]
    )
    .expect("metric can not be created");

    pub static ref DELIVERY_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("delivery_duration_seconds", "Duration of successful transport calls")
            .buckets(exponential_buckets(0.01, 2.0, 16).expect("valid buckets")),
        &["subscriber"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static DEFAULT_REGISTRATION: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) -> Result<()> {
    registry.register(Box::new(DELIVERED_FILES.clone()))?;
    registry.register(Box::new(DELIVERY_FAILURES.clone()))?;
    registry.register(Box::new(BACKLOGGED_FILES.clone()))?;
    registry.register(Box::new(DROPPED_FILES.clone()))?;
    registry.register(Box::new(QUEUED_FILES.clone()))?;
    registry.register(Box::new(DELIVERY_DURATION.clone()))?;
    Ok(())
}

fn register_default_registry() {
    DEFAULT_REGISTRATION.call_once(|| {
        if let Err(e) = register_custom_metrics(&REGISTRY) {
            error!("failed to register delivery metrics: {:?}", e);
        }
    });
}

/// Serves `/metrics` until `shutdown` is cancelled.
pub async fn start_server(
    addr: SocketAddr,
    shutdown: CancellationToken,
) {
    register_default_registry();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (addr, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(addr, async move {
            shutdown.cancelled().await;
        });
    info!("metrics server listening on {}", addr);
    server.await;
}

pub(crate) fn gather_text(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::new()
    })
}

async fn metrics_handler() -> std::result::Result<impl Reply, Rejection> {
    Ok(gather_text(&REGISTRY))
}

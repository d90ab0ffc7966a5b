//! Prometheus metrics for the chart analysis bot.
//!
//! Exposes:
//! - `chartwatch_analysis_duration_seconds` (histogram, by model)
//! - `chartwatch_analysis_total` (counter, by model and status)
//! - `chartwatch_analysis_inflight` (gauge)
//! - `chartwatch_access_denied_total` (counter)
//! - process metrics via the `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static ANALYSIS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 250ms up to ~4 minutes; a vision call plus
    // one fallback can take a while.
    let buckets =
        prometheus::exponential_buckets(0.25, 2.0, 11).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "chartwatch_analysis_duration_seconds",
        "Chart analysis duration in seconds",
        &["model"],
        buckets
    )
    .expect("failed to register analysis duration histogram")
});

static ANALYSIS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chartwatch_analysis_total",
        "Total chart analyses by model and status",
        &["model", "status"]
    )
    .expect("failed to register analysis counter")
});

static ANALYSIS_INFLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "chartwatch_analysis_inflight",
        "Number of in-flight chart analyses"
    )
    .expect("failed to register inflight gauge")
});

static ACCESS_DENIED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "chartwatch_access_denied_total",
        "Updates rejected by the allow-list"
    )
    .expect("failed to register access denied counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&ANALYSIS_DURATION);
    Lazy::force(&ANALYSIS_TOTAL);
    Lazy::force(&ANALYSIS_INFLIGHT);
    Lazy::force(&ACCESS_DENIED);
}

/// Mark an analysis as started.
pub fn record_analysis_start() {
    init_collectors();
    ANALYSIS_INFLIGHT.inc();
}

/// Record a finished analysis with the model that produced (or failed to
/// produce) the result.
pub fn record_analysis_result(model: &str, duration: Duration, success: bool) {
    init_collectors();
    ANALYSIS_INFLIGHT.dec();
    ANALYSIS_DURATION
        .with_label_values(&[model])
        .observe(duration.as_secs_f64());
    ANALYSIS_TOTAL
        .with_label_values(&[model, if success { "ok" } else { "error" }])
        .inc();
}

/// Record an update rejected by the allow-list.
pub fn record_access_denied() {
    init_collectors();
    ACCESS_DENIED.inc();
}

async fn metrics_response() -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}

/// Serve `/metrics` on the given address until the process exits.
pub async fn serve(addr: SocketAddr) -> std::io::Result<()> {
    init_collectors();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Metrics endpoint listening");

    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                warn!("Metrics connection error: {}", err);
            }
        });
    }
}

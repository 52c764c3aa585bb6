//! Prometheus metrics for pipeline runs.
//!
//! Families:
//! - `abxplore_command_duration_seconds{command,status}` (histogram)
//! - `abxplore_command_inflight{command}` (gauge)
//! - `abxplore_stage_duration_seconds{stage}` (histogram)
//! - `abxplore_records_total{entity,disposition}`
//! - `abxplore_records_dropped_total{entity,reason}`
//! - `abxplore_quality_issues_total{entity,flag}`
//!
//! plus the process collector. [`spawn_metrics_server`] serves them on
//! `/metrics`, with a plain `/healthz` beside it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::pipeline::EntityQuality;

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // 10ms .. ~80s
    let buckets =
        prometheus::exponential_buckets(0.01, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "abxplore_command_duration_seconds",
        "CLI command duration in seconds, by outcome",
        &["command", "status"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "abxplore_command_inflight",
        "Commands currently running",
        &["command"]
    )
    .expect("failed to register inflight gauge")
});

static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // 100us .. ~13s
    let buckets =
        prometheus::exponential_buckets(0.000_1, 4.0, 9).expect("failed to create stage buckets");
    register_histogram_vec!(
        "abxplore_stage_duration_seconds",
        "Time spent in each pipeline stage",
        &["stage"],
        buckets
    )
    .expect("failed to register stage duration histogram")
});

static RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "abxplore_records_total",
        "Records seen by the cleaners, by entity and disposition (in, kept)",
        &["entity", "disposition"]
    )
    .expect("failed to register records counter")
});

static RECORDS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "abxplore_records_dropped_total",
        "Records dropped during cleaning, by entity and reason",
        &["entity", "reason"]
    )
    .expect("failed to register dropped counter")
});

static QUALITY_ISSUES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "abxplore_quality_issues_total",
        "Raised quality flags on kept records, by entity and flag",
        &["entity", "flag"]
    )
    .expect("failed to register quality issue counter")
});

fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_INFLIGHT);
    Lazy::force(&STAGE_DURATION);
    Lazy::force(&RECORDS_TOTAL);
    Lazy::force(&RECORDS_DROPPED);
    Lazy::force(&QUALITY_ISSUES);
}

/// Tracks one CLI command from start to finish.
///
/// A timer dropped without [`CommandTimer::finish`] is recorded as an error,
/// so an early return or panic still leaves the gauge balanced.
pub struct CommandTimer {
    command: &'static str,
    started: Instant,
    finished: bool,
}

impl CommandTimer {
    pub fn start(command: &'static str) -> Self {
        init_collectors();
        COMMAND_INFLIGHT.with_label_values(&[command]).inc();
        Self {
            command,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Record the outcome and return the elapsed time.
    pub fn finish(mut self, success: bool) -> Duration {
        self.record(success)
    }

    fn record(&mut self, success: bool) -> Duration {
        let elapsed = self.started.elapsed();
        self.finished = true;
        COMMAND_INFLIGHT.with_label_values(&[self.command]).dec();
        COMMAND_DURATION
            .with_label_values(&[self.command, if success { "ok" } else { "error" }])
            .observe(elapsed.as_secs_f64());
        elapsed
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        if !self.finished {
            self.record(false);
        }
    }
}

/// Record how long one pipeline stage took.
pub fn observe_stage(stage: &'static str, elapsed: Duration) {
    init_collectors();
    STAGE_DURATION
        .with_label_values(&[stage])
        .observe(elapsed.as_secs_f64());
}

/// Add one entity's cleaning tallies to the record counters.
pub fn record_entity_quality(quality: &EntityQuality) {
    init_collectors();
    let entity = quality.entity.as_str();
    RECORDS_TOTAL
        .with_label_values(&[entity, "in"])
        .inc_by(quality.records_in as u64);
    RECORDS_TOTAL
        .with_label_values(&[entity, "kept"])
        .inc_by(quality.kept as u64);
    for (reason, count) in &quality.dropped {
        RECORDS_DROPPED
            .with_label_values(&[entity, reason.as_str()])
            .inc_by(*count as u64);
    }
    for (flag, count) in &quality.flag_counts {
        QUALITY_ISSUES
            .with_label_values(&[entity, flag.as_str()])
            .inc_by(*count as u64);
    }
}

/// Encode every registered family in the text exposition format.
fn render() -> prometheus::Result<(String, Vec<u8>)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

fn route(path: &str) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => match render() {
            Ok((content_type, body)) => respond(StatusCode::OK, &content_type, body),
            Err(err) => {
                error!("Failed to encode metrics: {}", err);
                respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "encode error")
            }
        },
        "/healthz" => respond(StatusCode::OK, "text/plain", "ok"),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", Bytes::new()),
    }
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.uri().path()))
}

async fn serve(listener: TcpListener) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("Metrics accept failed: {}", err);
                continue;
            }
        };
        debug!(?peer, "Metrics scrape connection");

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Bind `addr` and serve metrics in the background for the rest of the process.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(%addr, "Prometheus metrics endpoint started");
                serve(listener).await;
            }
            Err(err) => error!(%addr, "Metrics server failed to bind: {}", err),
        }
    });
}

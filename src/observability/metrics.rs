use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Facade over the crate's Prometheus instruments.
///
/// Safe to use before `init_metrics`; recordings made without an installed
/// recorder are dropped by the metrics macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

impl Metrics {
    pub fn record_operation(&self, kind: &str, status: &str, duration_ms: f64) {
        counter!("mq_probe_operations_total", "kind" => kind.to_string(), "status" => status.to_string()).increment(1);
        histogram!("mq_probe_operation_duration_ms", "kind" => kind.to_string())
            .record(duration_ms);
    }

    pub fn record_replay(&self, kind: &str) {
        counter!("mq_probe_replays_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_conflict(&self, kind: &str, reason: &str) {
        counter!("mq_probe_conflicts_total", "kind" => kind.to_string(), "reason" => reason.to_string()).increment(1);
    }

    pub fn record_lock_acquired(&self, kind: &str) {
        counter!("mq_probe_locks_acquired_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_sweep(&self, deleted: u64) {
        counter!("mq_probe_expired_records_swept_total").increment(deleted);
    }

    pub fn set_records_in_progress(&self, count: i64) {
        gauge!("mq_probe_records_in_progress").set(count as f64);
    }

    pub fn record_broker_messages(&self, queue: &str, count: u64, direction: &str) {
        counter!("mq_probe_broker_messages_total", "queue" => queue.to_string(), "direction" => direction.to_string()).increment(count);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder and returns its scrape handle.
pub fn init_metrics() -> PrometheusHandle {
    let handle = METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        describe_metrics();
        handle
    });

    METRICS.get_or_init(Metrics::default);

    handle.clone()
}

fn describe_metrics() {
    describe_counter!(
        "mq_probe_operations_total",
        Unit::Count,
        "Broker operations executed, by kind and outcome"
    );
    describe_histogram!(
        "mq_probe_operation_duration_ms",
        Unit::Milliseconds,
        "Broker operation latency in milliseconds"
    );
    describe_counter!(
        "mq_probe_replays_total",
        Unit::Count,
        "Completed operations answered from the stored response"
    );
    describe_counter!(
        "mq_probe_conflicts_total",
        Unit::Count,
        "Idempotency conflicts, by kind and reason"
    );
    describe_counter!(
        "mq_probe_locks_acquired_total",
        Unit::Count,
        "Idempotency locks acquired"
    );
    describe_counter!(
        "mq_probe_expired_records_swept_total",
        Unit::Count,
        "Expired idempotency records removed by the sweeper"
    );
    describe_gauge!(
        "mq_probe_records_in_progress",
        Unit::Count,
        "Live idempotency records currently in progress"
    );
    describe_counter!(
        "mq_probe_broker_messages_total",
        Unit::Count,
        "Messages moved through the broker, by queue and direction"
    );
}

/// Returns the process-wide metrics facade.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::default)
}

use crate::broker::KafkaConnector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound for a single probe round-trip.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Record store round-trips slower than this mark the probe degraded.
const STORE_DEGRADED_MS: f64 = 100.0;
/// Broker metadata round-trips slower than this mark the probe degraded.
const BROKER_DEGRADED_MS: f64 = 250.0;

/// Health of one probe, or of the service as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// True while the service can still take traffic.
    pub fn is_serving(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }

    fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
        }
    }
}

/// Outcome of probing a single dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe: String,
    pub status: HealthStatus,
    pub latency_ms: Option<f64>,
    pub details: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    /// Probe answered. Latency above the threshold downgrades it to degraded.
    pub fn up(probe: &str, latency_ms: f64, degraded_after_ms: f64) -> Self {
        let (status, details) = if latency_ms > degraded_after_ms {
            (
                HealthStatus::Degraded,
                Some(format!("latency above {}ms", degraded_after_ms)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };
        Self {
            probe: probe.to_string(),
            status,
            latency_ms: Some(latency_ms),
            details,
            checked_at: Utc::now(),
        }
    }

    /// Probe failed or timed out.
    pub fn down(probe: &str, details: impl Into<String>) -> Self {
        Self {
            probe: probe.to_string(),
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            details: Some(details.into()),
            checked_at: Utc::now(),
        }
    }
}

/// Aggregate health report across every probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationHealth {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub checked_at: DateTime<Utc>,
    pub probes: Vec<ProbeResult>,
}

impl ApplicationHealth {
    /// Aggregates to the worst status across the given probes.
    pub fn new(version: impl Into<String>, uptime_seconds: u64, probes: Vec<ProbeResult>) -> Self {
        let status = probes
            .iter()
            .map(|probe| probe.status)
            .max_by_key(HealthStatus::severity)
            .unwrap_or(HealthStatus::Healthy);
        Self {
            status,
            version: version.into(),
            uptime_seconds,
            checked_at: Utc::now(),
            probes,
        }
    }
}

/// Probes the record store and the default broker cluster.
pub struct HealthChecker {
    pool: PgPool,
    connector: Arc<KafkaConnector>,
    started: Instant,
}

impl HealthChecker {
    pub fn new(pool: PgPool, connector: Arc<KafkaConnector>) -> Self {
        Self {
            pool,
            connector,
            started: Instant::now(),
        }
    }

    /// Runs every probe and folds the outcomes into one report.
    pub async fn check_all(&self) -> ApplicationHealth {
        let probes = vec![self.check_store().await, self.check_broker().await];
        ApplicationHealth::new(env!("CARGO_PKG_VERSION"), self.uptime_seconds(), probes)
    }

    /// Round-trips a trivial query against the record store.
    pub async fn check_store(&self) -> ProbeResult {
        let started = Instant::now();
        match tokio::time::timeout(PROBE_TIMEOUT, sqlx::query("SELECT 1").fetch_one(&self.pool))
            .await
        {
            Ok(Ok(_)) => ProbeResult::up("record_store", elapsed_ms(started), STORE_DEGRADED_MS),
            Ok(Err(e)) => ProbeResult::down("record_store", format!("query failed: {}", e)),
            Err(_) => ProbeResult::down("record_store", "probe timed out"),
        }
    }

    /// Round-trips a metadata request against the default broker cluster.
    pub async fn check_broker(&self) -> ProbeResult {
        let started = Instant::now();
        match tokio::time::timeout(PROBE_TIMEOUT, self.connector.probe_default_cluster()).await {
            Ok(Ok(_)) => ProbeResult::up("broker", elapsed_ms(started), BROKER_DEGRADED_MS),
            Ok(Err(e)) => ProbeResult::down("broker", format!("metadata request failed: {}", e)),
            Err(_) => ProbeResult::down("broker", "probe timed out"),
        }
    }

    /// Only the record store gates readiness. Operations against an unreachable
    /// broker already fail loudly on their own, so the broker probe stays out
    /// of the serving decision.
    pub async fn is_ready(&self) -> bool {
        self.check_store().await.status.is_serving()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_probe_reports_healthy() {
        let probe = ProbeResult::up("record_store", 3.2, STORE_DEGRADED_MS);
        assert_eq!(probe.status, HealthStatus::Healthy);
        assert_eq!(probe.latency_ms, Some(3.2));
        assert!(probe.details.is_none());
    }

    #[test]
    fn slow_probe_reports_degraded_with_details() {
        let probe = ProbeResult::up("broker", 400.0, BROKER_DEGRADED_MS);
        assert_eq!(probe.status, HealthStatus::Degraded);
        assert_eq!(probe.details.as_deref(), Some("latency above 250ms"));
    }

    #[test]
    fn failed_probe_reports_unhealthy() {
        let probe = ProbeResult::down("broker", "probe timed out");
        assert_eq!(probe.status, HealthStatus::Unhealthy);
        assert!(probe.latency_ms.is_none());
    }

    #[test]
    fn report_takes_the_worst_probe_status() {
        let report = ApplicationHealth::new(
            "0.1.0",
            42,
            vec![
                ProbeResult::up("record_store", 1.0, STORE_DEGRADED_MS),
                ProbeResult::up("broker", 1.0, BROKER_DEGRADED_MS),
            ],
        );
        assert_eq!(report.status, HealthStatus::Healthy);

        let report = ApplicationHealth::new(
            "0.1.0",
            42,
            vec![
                ProbeResult::up("record_store", 1.0, STORE_DEGRADED_MS),
                ProbeResult::up("broker", 999.0, BROKER_DEGRADED_MS),
            ],
        );
        assert_eq!(report.status, HealthStatus::Degraded);

        let report = ApplicationHealth::new(
            "0.1.0",
            42,
            vec![
                ProbeResult::up("record_store", 1.0, STORE_DEGRADED_MS),
                ProbeResult::down("broker", "unreachable"),
            ],
        );
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn report_without_probes_is_healthy() {
        let report = ApplicationHealth::new("0.1.0", 0, Vec::new());
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn degraded_status_still_serves() {
        assert!(HealthStatus::Healthy.is_serving());
        assert!(HealthStatus::Degraded.is_serving());
        assert!(!HealthStatus::Unhealthy.is_serving());
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded.is_healthy());
    }
}

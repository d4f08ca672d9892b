//! Metrics instrumentation for etcd-dns.
//!
//! All metrics are prefixed with `etcd_dns.`

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

use crate::error::RegistryError;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: Duration) {
    counter!("etcd_dns.query.count", "type" => record_type.to_string(), "result" => result.as_str())
        .increment(1);
    histogram!("etcd_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Query returned records successfully.
    Success,
    /// Name not found.
    NxDomain,
    /// Registry failure.
    Error,
}

impl QueryResult {
    fn as_str(&self) -> &'static str {
        match self {
            QueryResult::Success => "success",
            QueryResult::NxDomain => "nxdomain",
            QueryResult::Error => "error",
        }
    }
}

/// Record a registry call.
pub fn record_registry_op<T>(op: &'static str, result: &Result<T, RegistryError>, duration: Duration) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(RegistryError::NotFound { .. }) => "not_found",
        Err(RegistryError::Timeout { .. }) => "timeout",
        Err(_) => "error",
    };

    counter!("etcd_dns.registry.op.count", "op" => op, "outcome" => outcome).increment(1);
    histogram!("etcd_dns.registry.op.duration.seconds", "op" => op).record(duration.as_secs_f64());
}

/// Heartbeat cycle outcomes.
#[derive(Debug, Clone, Copy)]
pub enum HeartbeatOutcome {
    /// Entry written.
    Published,
    /// Registry write failed.
    PublishFailed,
    /// Health check failed; nothing written.
    CheckFailed,
}

/// Record the outcome of one heartbeat cycle.
pub fn record_heartbeat(kind: &'static str, outcome: HeartbeatOutcome) {
    let outcome_str = match outcome {
        HeartbeatOutcome::Published => "published",
        HeartbeatOutcome::PublishFailed => "publish_failed",
        HeartbeatOutcome::CheckFailed => "check_failed",
    };

    counter!("etcd_dns.heartbeat.cycle.count", "kind" => kind, "outcome" => outcome_str)
        .increment(1);
}

/// Record a removal on exit.
pub fn record_removal(kind: &'static str, ok: bool) {
    counter!("etcd_dns.heartbeat.removal.count", "kind" => kind, "ok" => if ok { "true" } else { "false" })
        .increment(1);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

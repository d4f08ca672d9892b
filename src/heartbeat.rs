//! Heartbeat agent keeping a single registry entry alive.
//!
//! Each cycle optionally runs a health check, then writes the entry with its
//! TTL. A failed check skips the write and leaves the entry to expire on its
//! own; it is never removed actively. Cycles run back to back with `interval`
//! between them, starting immediately.
//!
//! When `remove_on_exit` is set the entry is deleted once the shutdown token
//! fires. A running health check is dropped at that point, killing its child
//! process; an in-flight write is allowed to finish first.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AnnounceConfig, Config};
use crate::error::{CheckError, DnsError};
use crate::identity;
use crate::metrics::{self, HeartbeatOutcome};
use crate::records::{NodeRecord, ServiceRecord};
use crate::registry::{key_path, Registry};

/// Description of the entry an agent maintains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// What is being announced ("node" or "service"), for logs and metrics.
    pub kind: &'static str,
    /// Registry key.
    pub key: String,
    /// Serialized record.
    pub payload: String,
    /// Registry TTL; `None` stores the entry without expiry.
    pub ttl: Option<Duration>,
    /// Time between cycles.
    pub interval: Duration,
    /// Delete the entry on shutdown.
    pub remove_on_exit: bool,
}

impl Announcement {
    /// Build an announcement from second-based settings. A TTL of zero means
    /// no expiry.
    pub fn new(
        kind: &'static str,
        key: String,
        payload: String,
        ttl_secs: u64,
        interval_secs: u64,
        remove_on_exit: bool,
    ) -> Self {
        Self {
            kind,
            key,
            payload,
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            interval: Duration::from_secs(interval_secs),
            remove_on_exit,
        }
    }
}

/// Gate run before each publish.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// `Ok` lets the cycle publish.
    async fn check(&self) -> Result<(), CheckError>;
}

/// Runs a command through `/bin/sh -c`; exit status 0 passes.
#[derive(Debug, Clone)]
pub struct ShellCheck {
    command: String,
    timeout: Option<Duration>,
}

impl ShellCheck {
    /// Check with no time limit.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Kill the command if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the configured check, if any.
    pub fn from_config(config: &AnnounceConfig) -> Option<Self> {
        let command = config.check.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        let check = Self::new(command);
        Some(match config.check_timeout_secs {
            Some(secs) if secs > 0 => check.with_timeout(Duration::from_secs(secs)),
            _ => check,
        })
    }
}

#[async_trait]
impl HealthCheck for ShellCheck {
    async fn check(&self) -> Result<(), CheckError> {
        let mut command = tokio::process::Command::new("/bin/sh");
        command.arg("-c").arg(&self.command).kill_on_drop(true);

        let output = command.output();
        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, output).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(CheckError::Timeout {
                        command: self.command.clone(),
                        timeout,
                    })
                }
            },
            None => output.await,
        }
        .map_err(|source| CheckError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(CheckError::Failed {
            command: self.command.clone(),
            status: output.status.to_string(),
            output: combined.trim().to_string(),
        })
    }
}

/// Keeps one announcement alive in the registry.
pub struct HeartbeatAgent {
    registry: Arc<dyn Registry>,
    announcement: Announcement,
    check: Option<Arc<dyn HealthCheck>>,
}

impl HeartbeatAgent {
    /// Create an agent. Fails if the TTL would lapse between renewals.
    pub fn new(registry: Arc<dyn Registry>, announcement: Announcement) -> Result<Self, DnsError> {
        if announcement.interval.is_zero() {
            return Err(DnsError::Config(format!(
                "{} interval must be positive",
                announcement.kind
            )));
        }
        if let Some(ttl) = announcement.ttl {
            if ttl <= announcement.interval {
                return Err(DnsError::Config(format!(
                    "{} ttl ({:?}) must be greater than interval ({:?})",
                    announcement.kind, ttl, announcement.interval
                )));
            }
        }

        Ok(Self {
            registry,
            announcement,
            check: None,
        })
    }

    /// Run `check` before every publish.
    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.check = Some(check);
        self
    }

    /// Run one check-then-publish cycle.
    ///
    /// The health check is abandoned if `shutdown` fires while it runs, and
    /// `None` is returned. A write that has started always completes.
    pub async fn cycle(&self, shutdown: &CancellationToken) -> Option<HeartbeatOutcome> {
        let a = &self.announcement;

        if let Some(check) = &self.check {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(key = %a.key, "shutdown during health check");
                    return None;
                }
                result = check.check() => result,
            };
            if let Err(e) = result {
                warn!(key = %a.key, error = %e, "health check failed, skipping announcement");
                metrics::record_heartbeat(a.kind, HeartbeatOutcome::CheckFailed);
                return Some(HeartbeatOutcome::CheckFailed);
            }
        }

        let outcome = match self.registry.set(&a.key, &a.payload, a.ttl).await {
            Ok(()) => {
                debug!(key = %a.key, ttl = ?a.ttl, "announced");
                HeartbeatOutcome::Published
            }
            Err(e) => {
                warn!(key = %a.key, error = %e, "failed to announce");
                HeartbeatOutcome::PublishFailed
            }
        };
        metrics::record_heartbeat(a.kind, outcome);
        Some(outcome)
    }

    /// Run cycles until `shutdown` is cancelled, then remove the entry if
    /// configured to.
    pub async fn run(self, shutdown: CancellationToken) {
        let a = &self.announcement;
        info!(
            kind = a.kind,
            key = %a.key,
            interval = ?a.interval,
            ttl = ?a.ttl,
            remove_on_exit = a.remove_on_exit,
            "starting heartbeat"
        );

        loop {
            if self.cycle(&shutdown).await.is_none() {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(a.interval) => {}
            }
        }

        info!(key = %a.key, "heartbeat stopping");
        if a.remove_on_exit {
            self.remove().await;
        }
    }

    /// Best-effort delete; not retried.
    async fn remove(&self) {
        let a = &self.announcement;
        match self.registry.delete(&a.key).await {
            Ok(()) => {
                info!(key = %a.key, "removed registry entry");
                metrics::record_removal(a.kind, true);
            }
            Err(e) => {
                warn!(key = %a.key, error = %e, "delete failed");
                metrics::record_removal(a.kind, false);
            }
        }
    }
}

/// Announcement for this host under `<prefix>/nodes/<name>`.
pub fn node_announcement(config: &Config) -> Result<Announcement, DnsError> {
    config.node.validate()?;
    let name = identity::node_name(config.node.name.as_deref())?;
    let ip = identity::node_address(config.node.address.as_deref())?;
    let payload = serde_json::to_string(&NodeRecord::new(ip))?;

    Ok(Announcement::new(
        "node",
        key_path(&config.registry.prefix, &["nodes", &name]),
        payload,
        config.node.ttl,
        config.node.interval,
        config.remove_on_exit,
    ))
}

/// Announcement for an instance of `service` on this host, under
/// `<prefix>/services/<service>/<node-name>`.
pub fn service_announcement(
    config: &Config,
    service: &str,
    port: u16,
) -> Result<Announcement, DnsError> {
    config.announce.validate()?;
    let service = service.trim().to_lowercase();
    if service.is_empty() {
        return Err(DnsError::Config("empty service name".to_string()));
    }
    if service.contains(['.', '/']) {
        return Err(DnsError::Config(format!("invalid service name: {service}")));
    }

    let name = identity::node_name(config.node.name.as_deref())?;
    let payload = serde_json::to_string(&ServiceRecord {
        priority: config.announce.priority,
        weight: config.announce.weight,
        port,
        target: name.clone(),
    })?;

    Ok(Announcement::new(
        "service",
        key_path(&config.registry.prefix, &["services", &service, &name]),
        payload,
        config.announce.ttl,
        config.announce.interval,
        config.remove_on_exit,
    ))
}

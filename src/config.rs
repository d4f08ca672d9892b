//! Configuration types for etcd-dns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Registry (etcd) connection settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Service announcement settings.
    #[serde(default)]
    pub announce: AnnounceConfig,

    /// Node registration settings.
    #[serde(default)]
    pub node: NodeConfig,

    /// Delete the registered key when the agent is terminated.
    #[serde(default)]
    pub remove_on_exit: bool,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Check the settings every subcommand depends on. Section-specific
    /// rules live on the sections and are checked where they are used.
    pub fn validate(&self) -> Result<(), DnsError> {
        self.registry.validate()
    }
}

/// A registry TTL must outlast the renewal interval, or entries would expire
/// between heartbeats. A TTL of zero disables expiry.
fn check_ttl(what: &str, ttl: u64, interval: u64) -> Result<(), DnsError> {
    if interval == 0 {
        return Err(DnsError::Config(format!("{what} interval must be positive")));
    }
    if ttl != 0 && ttl <= interval {
        return Err(DnsError::Config(format!(
            "{what} ttl ({ttl}s) must be greater than interval ({interval}s)"
        )));
    }
    Ok(())
}

/// Registry connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// etcd client URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Key prefix under which `nodes/` and `services/` live.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Upper bound for every registry call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl RegistryConfig {
    /// A zero timeout would fail every call.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.timeout_secs == 0 {
            return Err(DnsError::Config("registry timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            prefix: default_prefix(),
            timeout_secs: default_timeout(),
        }
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// UDP address for the DNS server to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Domain served (e.g., "svc."). Queries look like
    /// `<name>.nodes.<domain>` and `<name>.services.<domain>`.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// TTL for DNS answers in seconds.
    #[serde(default)]
    pub ttl: u32,

    /// SOA record configuration.
    #[serde(default)]
    pub soa: SoaConfig,
}

impl DnsConfig {
    /// Reject a domain with no labels.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.domain.trim_matches('.').is_empty() {
            return Err(DnsError::Config("dns domain must not be empty".to_string()));
        }
        Ok(())
    }

    /// The domain lower-cased, with empty labels dropped and a trailing dot.
    pub fn normalized_domain(&self) -> String {
        normalize_domain(&self.domain)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            domain: default_domain(),
            ttl: 0,
            soa: SoaConfig::default(),
        }
    }
}

/// Lower-case a domain and make it fully qualified.
pub fn normalize_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    format!("{}.", labels.join(".")).to_lowercase()
}

/// Service announcement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceConfig {
    /// Registry TTL in seconds (0 = no expiry).
    #[serde(default)]
    pub ttl: u64,

    /// Seconds between announcements.
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// SRV weight.
    #[serde(default)]
    pub weight: u16,

    /// SRV priority.
    #[serde(default)]
    pub priority: u16,

    /// Shell command that must succeed before each announcement.
    #[serde(default)]
    pub check: Option<String>,

    /// Upper bound for a single check run, in seconds.
    #[serde(default)]
    pub check_timeout_secs: Option<u64>,
}

impl AnnounceConfig {
    /// TTL and interval rules for service announcements.
    pub fn validate(&self) -> Result<(), DnsError> {
        check_ttl("announce", self.ttl, self.interval)
    }
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            ttl: 0,
            interval: default_interval(),
            weight: 0,
            priority: 0,
            check: None,
            check_timeout_secs: None,
        }
    }
}

/// Node registration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Registry TTL in seconds (0 = no expiry).
    #[serde(default)]
    pub ttl: u64,

    /// Seconds between registrations.
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Node name. Defaults to the hostname.
    #[serde(default)]
    pub name: Option<String>,

    /// IPv4 address to publish. Defaults to the first global unicast
    /// interface address.
    #[serde(default)]
    pub address: Option<String>,
}

impl NodeConfig {
    /// TTL and interval rules for node registration.
    pub fn validate(&self) -> Result<(), DnsError> {
        check_ttl("node", self.ttl, self.interval)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ttl: 0,
            interval: default_interval(),
            name: None,
            address: None,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "etcd_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

/// SOA (Start of Authority) record configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Primary nameserver hostname (e.g., "ns1.local.").
    #[serde(default = "default_mname")]
    pub mname: String,

    /// Admin mailbox in DNS format (e.g., "hostmaster.local.").
    #[serde(default = "default_rname")]
    pub rname: String,

    /// Refresh interval in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// Retry interval in seconds.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Expire time in seconds.
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// Negative caching TTL in seconds.
    #[serde(default)]
    pub minimum: u32,
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            mname: default_mname(),
            rname: default_rname(),
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: 0,
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:4001".to_string()
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 15353))
}

fn default_domain() -> String {
    "local.".to_string()
}

fn default_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mname() -> String {
    "ns1.local.".to_string()
}

fn default_rname() -> String {
    "hostmaster.local.".to_string()
}

fn default_refresh() -> u32 {
    3600
}

fn default_retry() -> u32 {
    600
}

fn default_expire() -> u32 {
    86400
}

//! Node and service records stored in the registry.
//!
//! Layout:
//!
//! ```text
//! <prefix>/nodes/<node>                 {"ip": "10.0.0.5"}
//! <prefix>/services/<service>/<node>    {"priority": 0, "weight": 0, "port": 8080, "target": "web1"}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::registry::{key_path, Registry};

/// A host's published address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// IPv4 address. Missing, empty or `0.0.0.0` means the node has no
    /// usable address.
    #[serde(default, deserialize_with = "deserialize_ip")]
    pub ip: Option<Ipv4Addr>,
}

impl NodeRecord {
    /// Record for the given address.
    pub fn new(ip: Ipv4Addr) -> Self {
        Self { ip: Some(ip) }
    }

    /// The address, if it is usable.
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.ip.filter(|ip| !ip.is_unspecified())
    }
}

fn deserialize_ip<'de, D>(deserializer: D) -> Result<Option<Ipv4Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<Ipv4Addr>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not an ipv4 address: {s}"))),
    }
}

/// One registered instance of a service, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// SRV priority.
    #[serde(default)]
    pub priority: u16,
    /// SRV weight.
    #[serde(default)]
    pub weight: u16,
    /// Port the instance listens on.
    #[serde(default)]
    pub port: u16,
    /// Node name or fully qualified host.
    #[serde(default)]
    pub target: String,
}

/// Where a service instance lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A node registered under `<prefix>/nodes/`, resolvable locally.
    LocalNode(String),
    /// An external hostname, passed through as is.
    ExternalHost(String),
}

impl Target {
    /// Any target containing a `.` is an external host.
    pub fn parse(target: &str) -> Self {
        if target.contains('.') {
            Target::ExternalHost(target.to_string())
        } else {
            Target::LocalNode(target.to_lowercase())
        }
    }
}

/// A service instance ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// SRV priority.
    pub priority: u16,
    /// SRV weight.
    pub weight: u16,
    /// Port.
    pub port: u16,
    /// Target host.
    pub target: Target,
}

impl ServiceInstance {
    /// Convert a stored record. Records without a target are incomplete and
    /// yield `None`.
    pub fn from_record(record: ServiceRecord) -> Option<Self> {
        if record.target.is_empty() {
            return None;
        }
        Some(Self {
            priority: record.priority,
            weight: record.weight,
            port: record.port,
            target: Target::parse(&record.target),
        })
    }
}

/// Reads node and service records out of the registry.
#[derive(Clone)]
pub struct RecordStore {
    registry: Arc<dyn Registry>,
    prefix: String,
}

impl RecordStore {
    /// Create a store reading keys under `prefix`.
    pub fn new(registry: Arc<dyn Registry>, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            prefix: prefix.into(),
        }
    }

    /// Registry key for a node.
    pub fn node_key(&self, name: &str) -> String {
        let name = name.to_lowercase();
        let name = name.strip_suffix(".nodes.").unwrap_or(&name);
        key_path(&self.prefix, &["nodes", name])
    }

    /// Registry key for a service directory.
    pub fn service_key(&self, name: &str) -> String {
        let name = name.strip_suffix(".services.").unwrap_or(name);
        key_path(&self.prefix, &["services", name])
    }

    /// Look up a node.
    ///
    /// A missing key is an error (`NotFound`); a record without a usable
    /// address is `Ok(None)`.
    pub async fn get_node(&self, name: &str) -> Result<Option<NodeRecord>, RegistryError> {
        let key = self.node_key(name);
        let node = self.registry.get(&key, false).await?;
        let value = node.value.unwrap_or_default();

        let record: NodeRecord =
            serde_json::from_str(&value).map_err(|source| RegistryError::Decode {
                key: key.clone(),
                source,
            })?;

        if record.address().is_none() {
            debug!(key = %key, "node has no address");
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// List the instances of a service in registry order.
    ///
    /// Children that fail to decode or have no target are skipped.
    pub async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let key = self.service_key(name);
        let dir = self.registry.get(&key, true).await?;

        let mut instances = Vec::with_capacity(dir.nodes.len());
        for child in dir.nodes {
            let Some(value) = child.value else {
                warn!(key = %child.key, "skipping service entry without a value");
                continue;
            };
            let record: ServiceRecord = match serde_json::from_str(&value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %child.key, error = %e, "failed to decode service record");
                    continue;
                }
            };
            match ServiceInstance::from_record(record) {
                Some(instance) => instances.push(instance),
                None => debug!(key = %child.key, "skipping service record without target"),
            }
        }

        Ok(instances)
    }
}

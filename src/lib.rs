//! etcd DNS - An authoritative DNS server for service discovery backed by etcd.
//!
//! Hosts register themselves and the services they run as keys in an etcd
//! v2 keys store. Heartbeat agents keep those keys alive with a TTL, and the
//! DNS server answers queries by reading the registry on every request.
//!
//! ## Features
//!
//! - A records for nodes: `<node>.nodes.<domain>`
//! - A and SRV records for services: `<service>.services.<domain>`, with glue
//!   A records for SRV targets that are local nodes
//! - Node and service heartbeat agents with optional shell health checks
//! - Removal of registered keys on graceful shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  set/ttl   ┌──────────────┐   get    ┌──────────────────┐
//! │  Heartbeat   │───────────▶│     etcd     │◀─────────│  Hickory DNS     │◀── UDP
//! │  agents      │            │  (v2 keys)   │          │  server          │
//! └──────────────┘            └──────────────┘          └──────────────────┘
//!   node, announce              nodes/<node>              Resolver
//!                               services/<svc>/<node>
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! web1.nodes.local.     A    → nodes/web1 {"ip": ...}
//! api.services.local.   A    → services/api/* → nodes/<target> for each local target
//! api.services.local.   SRV  → services/api/* → one SRV per instance, glue A for local targets
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use etcd_dns::{shutdown, Config, DnsServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let server = DnsServer::new(config);
//!     server.run(shutdown::signal_token()).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod classify;
pub mod config;
pub mod error;
pub mod etcd;
pub mod heartbeat;
pub mod identity;
pub mod memory;
pub mod metrics;
pub mod records;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod shutdown;
pub mod telemetry;

// Re-export main types
pub use authority::RegistryAuthority;
pub use config::{
    AnnounceConfig, Config, DnsConfig, NodeConfig, RegistryConfig, SoaConfig, TelemetryConfig,
};
pub use error::{CheckError, DnsError, RegistryError};
pub use etcd::EtcdRegistry;
pub use heartbeat::{Announcement, HealthCheck, HeartbeatAgent, ShellCheck};
pub use memory::MemoryRegistry;
pub use records::RecordStore;
pub use registry::{KeyNode, Registry};
pub use resolver::{Resolution, Resolver};
pub use server::DnsServer;

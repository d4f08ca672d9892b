//! DNS server setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::authority::RegistryAuthority;
use crate::config::Config;
use crate::error::DnsError;
use crate::etcd;
use crate::records::RecordStore;
use crate::registry::Registry;
use crate::resolver::Resolver;

/// DNS server answering from the etcd registry.
pub struct DnsServer {
    config: Config,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the authority over `registry`.
    pub fn authority(&self, registry: Arc<dyn Registry>) -> Result<RegistryAuthority, DnsError> {
        let store = RecordStore::new(registry, self.config.registry.prefix.clone());
        let resolver = Resolver::new(store, &self.config.dns);
        Ok(RegistryAuthority::new(self.config.dns.clone(), resolver)?)
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(
            listen_addr = %self.config.dns.listen_addr,
            domain = %self.config.dns.normalized_domain(),
            etcd = %self.config.registry.endpoint,
            prefix = %self.config.registry.prefix,
            "Starting etcd-dns server"
        );

        let registry = etcd::connect(&self.config.registry)?;
        let authority = self.authority(registry)?;

        let udp_socket = UdpSocket::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS UDP listening");

        serve(udp_socket, catalog(authority), shutdown).await
    }
}

/// A catalog holding only `authority`.
pub fn catalog(authority: RegistryAuthority) -> Catalog {
    let mut catalog = Catalog::new();
    let authority: Arc<dyn AuthorityObject> = Arc::new(authority);
    catalog.upsert(authority.origin().clone(), vec![authority]);
    catalog
}

/// Serve `catalog` on `socket` until `shutdown` is cancelled.
pub async fn serve(
    socket: UdpSocket,
    catalog: Catalog,
    shutdown: CancellationToken,
) -> Result<(), DnsError> {
    let mut server = ServerFuture::new(catalog);
    server.register_socket(socket);

    info!("DNS server ready to serve queries");

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("DNS server shutdown requested");
        }
        result = server.block_until_done() => {
            if let Err(e) = result {
                error!("DNS server error: {}", e);
                return Err(e.into());
            }
        }
    }

    info!("DNS server stopped");
    Ok(())
}

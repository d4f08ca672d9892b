//! etcd-dns binary entry point.

use clap::{Args as ClapArgs, Parser, Subcommand};
use etcd_dns::heartbeat::{self, Announcement};
use etcd_dns::{etcd, shutdown, telemetry, Config, DnsServer, HeartbeatAgent, ShellCheck};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// DNS service discovery backed by etcd.
#[derive(Parser, Debug)]
#[command(name = "etcd-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Optional.
    #[arg(short, long, global = true, default_value = "etcd-dns.toml")]
    config: PathBuf,

    /// etcd address.
    #[arg(long, global = true)]
    etcd: Option<String>,

    /// etcd key prefix.
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Remove the registered key on exit.
    #[arg(long, global = true)]
    remove_on_exit: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the DNS server.
    Server(ServerArgs),
    /// Announce a service instance on this node.
    Announce(AnnounceArgs),
    /// Register this node.
    Node(NodeArgs),
}

#[derive(ClapArgs, Debug)]
struct ServerArgs {
    /// Domain to serve.
    #[arg(long)]
    domain: Option<String>,

    /// UDP address to listen on.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// UDP port to listen on, keeping the configured address.
    #[arg(long)]
    port: Option<u16>,

    /// DNS TTL for responses.
    #[arg(long)]
    ttl: Option<u32>,
}

#[derive(ClapArgs, Debug)]
struct AnnounceArgs {
    /// Service name.
    service: String,

    /// Port the service listens on.
    #[arg(default_value_t = 0)]
    port: u16,

    /// Registry TTL in seconds (0 = no expiry).
    #[arg(long)]
    ttl: Option<u64>,

    /// Seconds between announcements.
    #[arg(long)]
    interval: Option<u64>,

    /// SRV weight.
    #[arg(long)]
    weight: Option<u16>,

    /// SRV priority.
    #[arg(long)]
    priority: Option<u16>,

    /// Shell command that must succeed before each announcement.
    #[arg(long)]
    check: Option<String>,

    /// Node name (defaults to the hostname).
    #[arg(long)]
    name: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct NodeArgs {
    /// Registry TTL in seconds (0 = no expiry).
    #[arg(long)]
    ttl: Option<u64>,

    /// Seconds between registrations.
    #[arg(long)]
    interval: Option<u64>,

    /// Node name (defaults to the hostname).
    #[arg(long)]
    name: Option<String>,

    /// IPv4 address to publish (defaults to the first global unicast address).
    #[arg(long)]
    address: Option<String>,
}

fn load_config(args: &Args) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::from(args.config.clone()).required(false))
        .add_source(
            config::Environment::with_prefix("ETCD_DNS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("registry.endpoint", args.etcd.clone())?
        .set_override_option("registry.prefix", args.prefix.clone())?
        .set_override_option("remove_on_exit", args.remove_on_exit.then_some(true))?;

    builder = match &args.command {
        Command::Server(s) => builder
            .set_override_option("dns.domain", s.domain.clone())?
            .set_override_option("dns.listen_addr", s.listen.map(|a| a.to_string()))?
            .set_override_option("dns.ttl", s.ttl.map(i64::from))?,
        Command::Announce(a) => builder
            .set_override_option("announce.ttl", a.ttl.map(|v| v as i64))?
            .set_override_option("announce.interval", a.interval.map(|v| v as i64))?
            .set_override_option("announce.weight", a.weight.map(i64::from))?
            .set_override_option("announce.priority", a.priority.map(i64::from))?
            .set_override_option("announce.check", a.check.clone())?
            .set_override_option("node.name", a.name.clone())?,
        Command::Node(n) => builder
            .set_override_option("node.ttl", n.ttl.map(|v| v as i64))?
            .set_override_option("node.interval", n.interval.map(|v| v as i64))?
            .set_override_option("node.name", n.name.clone())?
            .set_override_option("node.address", n.address.clone())?,
    };

    let mut config: Config = builder.build()?.try_deserialize()?;
    if let Command::Server(ServerArgs {
        port: Some(port), ..
    }) = &args.command
    {
        config.dns.listen_addr.set_port(*port);
    }
    Ok(config)
}

async fn run_agent(
    config: &Config,
    announcement: Announcement,
    check: Option<ShellCheck>,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = etcd::connect(&config.registry)?;
    let mut agent = HeartbeatAgent::new(registry, announcement)?;
    if let Some(check) = check {
        agent = agent.with_check(Arc::new(check));
    }
    agent.run(shutdown).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    config.validate()?;

    info!(
        config_file = %args.config.display(),
        etcd = %config.registry.endpoint,
        prefix = %config.registry.prefix,
        "Starting etcd-dns"
    );

    // Setup graceful shutdown
    let shutdown = shutdown::signal_token();

    let result: Result<(), Box<dyn std::error::Error>> = match args.command {
        Command::Server(_) => match config.dns.validate() {
            Ok(()) => DnsServer::new(config).run(shutdown).await.map_err(Into::into),
            Err(e) => Err(e.into()),
        },
        Command::Announce(a) => {
            let announcement = heartbeat::service_announcement(&config, &a.service, a.port)?;
            let check = ShellCheck::from_config(&config.announce);
            run_agent(&config, announcement, check, shutdown).await
        }
        Command::Node(_) => {
            let announcement = heartbeat::node_announcement(&config)?;
            run_agent(&config, announcement, None, shutdown).await
        }
    };

    if let Err(e) = result {
        error!("etcd-dns error: {}", e);
        return Err(e);
    }

    info!("etcd-dns shutdown complete");
    Ok(())
}

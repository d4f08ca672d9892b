//! Node name and address detection.
//!
//! Only IPv4 is supported: node records carry a single IPv4 address and
//! configured IPv6 addresses are rejected.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::DnsError;

/// The configured node name, or the lower-cased hostname.
pub fn node_name(configured: Option<&str>) -> Result<String, DnsError> {
    let name = match configured.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => hostname::get()
            .map_err(|e| DnsError::Config(format!("failed to get hostname: {e}")))?
            .to_string_lossy()
            .to_string(),
    };
    Ok(name.to_lowercase())
}

/// The configured address, or the first global unicast IPv4 interface
/// address.
pub fn node_address(configured: Option<&str>) -> Result<Ipv4Addr, DnsError> {
    match configured.map(str::trim).filter(|a| !a.is_empty()) {
        Some(addr) => parse_ipv4(addr),
        None => detect_ipv4(),
    }
}

fn parse_ipv4(addr: &str) -> Result<Ipv4Addr, DnsError> {
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        Ok(IpAddr::V6(_)) => Err(DnsError::Config(format!("not an ipv4 address: {addr}"))),
        Err(_) => Err(DnsError::Config(format!("failed to parse address: {addr}"))),
    }
}

fn detect_ipv4() -> Result<Ipv4Addr, DnsError> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|e| DnsError::Config(format!("failed to get interface addresses: {e}")))?;

    first_global_unicast(interfaces.iter().map(|iface| iface.ip()))
        .ok_or_else(|| DnsError::Config("failed to get address".to_string()))
}

fn first_global_unicast(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(ip) if is_global_unicast(ip) => Some(ip),
        _ => None,
    })
}

/// Unicast and not loopback or link-local. Private ranges count.
pub fn is_global_unicast(ip: Ipv4Addr) -> bool {
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_link_local())
}

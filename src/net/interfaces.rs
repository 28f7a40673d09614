//! Host interface addresses.
//!
//! Lists the IPs an operator may bind the panel to, and backs the
//! "address is local" check done before any socket is opened.

use std::io;
use std::net::IpAddr;

use serde::Serialize;

/// One address assigned to a host interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceAddr {
    pub interface: String,
    pub address: IpAddr,
}

/// Every IPv4/IPv6 address on the host, sorted and deduplicated.
#[cfg(unix)]
pub fn local_addresses() -> io::Result<Vec<InterfaceAddr>> {
    use std::net::{SocketAddrV4, SocketAddrV6};

    let mut out = Vec::new();
    for ifaddr in nix::ifaddrs::getifaddrs().map_err(io::Error::from)? {
        let Some(storage) = ifaddr.address else {
            continue;
        };
        let address = if let Some(v4) = storage.as_sockaddr_in() {
            IpAddr::V4(*SocketAddrV4::from(*v4).ip())
        } else if let Some(v6) = storage.as_sockaddr_in6() {
            IpAddr::V6(*SocketAddrV6::from(*v6).ip())
        } else {
            continue;
        };
        out.push(InterfaceAddr {
            interface: ifaddr.interface_name,
            address,
        });
    }
    out.sort_by(|a, b| (a.address, &a.interface).cmp(&(b.address, &b.interface)));
    out.dedup();
    Ok(out)
}

#[cfg(not(unix))]
pub fn local_addresses() -> io::Result<Vec<InterfaceAddr>> {
    use std::net::{Ipv4Addr, Ipv6Addr};

    Ok([IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)]
        .into_iter()
        .map(|address| InterfaceAddr {
            interface: "loopback".to_string(),
            address,
        })
        .collect())
}

/// Whether the panel may bind `address` on this host.
///
/// Wildcards and loopback always qualify.
pub fn is_bindable(address: IpAddr, local: &[InterfaceAddr]) -> bool {
    address.is_unspecified() || address.is_loopback() || local.iter().any(|a| a.address == address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn loopback_is_listed() {
        let local = local_addresses().unwrap();
        assert!(local
            .iter()
            .any(|a| a.address == IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn bindable_addresses() {
        let local = vec![InterfaceAddr {
            interface: "eth0".to_string(),
            address: "192.0.2.10".parse().unwrap(),
        }];
        assert!(is_bindable("0.0.0.0".parse().unwrap(), &local));
        assert!(is_bindable("::".parse().unwrap(), &local));
        assert!(is_bindable("127.0.0.1".parse().unwrap(), &local));
        assert!(is_bindable("192.0.2.10".parse().unwrap(), &local));
        assert!(!is_bindable("203.0.113.10".parse().unwrap(), &local));
    }
}

//! Listener socket construction.
//!
//! # Responsibilities
//! - Turn a persisted `(address, port, ipv6)` triple into a socket address
//! - Bind with `SO_REUSEADDR` (and `SO_REUSEPORT` on unix) so a replacement
//!   listener can be opened on the port the current one holds
//! - Refuse ports held by any other listener, even one that also set
//!   `SO_REUSEPORT`
//! - Classify bind failures

use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;

const BACKLOG: i32 = 1024;

/// Where the panel listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindSpec {
    pub address: IpAddr,
    pub port: u16,
    pub ipv6: bool,
}

impl BindSpec {
    /// The socket address actually bound. With `ipv6` on, the IPv4 wildcard
    /// is widened to the dual-stack `[::]`.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = match self.address {
            IpAddr::V4(v4) if self.ipv6 && v4.is_unspecified() => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            other => other,
        };
        SocketAddr::new(ip, self.port)
    }
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("address {0} is already in use")]
    AddrInUse(SocketAddr),

    #[error("address {0} is not available on this host")]
    AddrNotAvailable(SocketAddr),

    #[error("permission denied binding {0}")]
    PermissionDenied(SocketAddr),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Bind a non-blocking std listener ready to hand to the HTTP server.
///
/// Pass `shares_live_port` only when the panel's own listener holds
/// `spec.port` right now. Otherwise the port must be free of every other
/// listener before the shareable socket is opened.
pub fn bind(
    spec: &BindSpec,
    shares_live_port: bool,
) -> Result<std::net::TcpListener, ListenerError> {
    let addr = spec.socket_addr();
    let result = if shares_live_port {
        open(addr)
    } else {
        check_exclusive(addr).and_then(|()| open(addr))
    };
    result.map_err(|source| match source.kind() {
        io::ErrorKind::AddrInUse => ListenerError::AddrInUse(addr),
        io::ErrorKind::AddrNotAvailable => ListenerError::AddrNotAvailable(addr),
        io::ErrorKind::PermissionDenied => ListenerError::PermissionDenied(addr),
        _ => ListenerError::Bind { addr, source },
    })
}

fn new_socket(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if let SocketAddr::V6(v6) = addr {
        // Dual-stack only for the wildcard.
        socket.set_only_v6(!v6.ip().is_unspecified())?;
    }
    socket.set_reuse_address(true)?;
    Ok(socket)
}

/// Trial bind without `SO_REUSEPORT`: conflicts with any listener on `addr`.
fn check_exclusive(addr: SocketAddr) -> io::Result<()> {
    new_socket(addr)?.bind(&addr.into())
}

fn open(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = new_socket(addr)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    socket.set_nonblocking(true)?;

    let listener: std::net::TcpListener = socket.into();
    tracing::debug!(address = %listener.local_addr()?, "Listener socket bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn ipv6_widens_wildcard() {
        let spec = BindSpec {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 9999,
            ipv6: true,
        };
        assert_eq!(spec.socket_addr(), "[::]:9999".parse().unwrap());

        let spec = BindSpec { ipv6: false, ..spec };
        assert_eq!(spec.socket_addr(), "0.0.0.0:9999".parse().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn same_port_can_be_rebound() {
        let spec = BindSpec {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ipv6: false,
        };
        let first = bind(&spec, false).unwrap();
        let port = first.local_addr().unwrap().port();

        assert!(bind(&BindSpec { port, ..spec }, true).is_ok());
        assert!(matches!(
            bind(&BindSpec { port, ..spec }, false),
            Err(ListenerError::AddrInUse(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn foreign_reuse_port_holder_reports_in_use() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let holder = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
        holder.set_reuse_address(true).unwrap();
        holder.set_reuse_port(true).unwrap();
        holder.bind(&addr.into()).unwrap();
        holder.listen(16).unwrap();
        let port = holder.local_addr().unwrap().as_socket().unwrap().port();

        let spec = BindSpec {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            ipv6: false,
        };
        assert!(matches!(bind(&spec, false), Err(ListenerError::AddrInUse(_))));
    }

    #[test]
    fn foreign_holder_reports_in_use() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let spec = BindSpec {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            ipv6: false,
        };
        assert!(matches!(bind(&spec, false), Err(ListenerError::AddrInUse(_))));
    }

    #[test]
    fn foreign_address_not_available() {
        let spec = BindSpec {
            address: "203.0.113.77".parse().unwrap(),
            port: 0,
            ipv6: false,
        };
        assert!(matches!(
            bind(&spec, false),
            Err(ListenerError::AddrNotAvailable(_))
        ));
    }
}

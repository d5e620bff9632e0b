//! Listener setup for the HTTP server

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd};

use nix::sys::socket::{
    self, sockopt, AddressFamily, Backlog, SockFlag, SockProtocol, SockType, SockaddrIn,
    SockaddrIn6,
};

/// Parse `bind_address` and join it with `port`
///
/// Accepts plain IPv4/IPv6 literals, with or without brackets.
pub fn parse_bind_addr(bind_address: &str, port: u16) -> io::Result<SocketAddr> {
    let host = bind_address.trim().trim_start_matches('[').trim_end_matches(']');
    let ip: IpAddr = host.parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid bind address {:?}: {}", bind_address, e),
        )
    })?;
    Ok(SocketAddr::new(ip, port))
}

/// Bind a non-blocking TCP listener
///
/// SO_REUSEADDR is set so a restart does not trip over sockets lingering in
/// TIME_WAIT; IPv6 sockets are IPv6-only.
pub fn bind_tcp_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let family = match addr {
        SocketAddr::V4(_) => AddressFamily::Inet,
        SocketAddr::V6(_) => AddressFamily::Inet6,
    };
    let fd = socket::socket(family, SockType::Stream, SockFlag::SOCK_CLOEXEC, SockProtocol::Tcp)?;

    socket::setsockopt(&fd, sockopt::ReuseAddr, &true)?;

    match addr {
        SocketAddr::V4(v4) => socket::bind(fd.as_raw_fd(), &SockaddrIn::from(v4))?,
        SocketAddr::V6(v6) => {
            socket::setsockopt(&fd, sockopt::Ipv6V6Only, &true)?;
            socket::bind(fd.as_raw_fd(), &SockaddrIn6::from(v6))?;
        }
    }
    socket::listen(&fd, Backlog::MAXCONN)?;

    // SAFETY: `fd` is a freshly created, bound and listening TCP socket whose
    // ownership moves into the listener.
    let listener = unsafe { TcpListener::from_raw_fd(fd.into_raw_fd()) };
    listener.set_nonblocking(true)?;
    Ok(listener)
}

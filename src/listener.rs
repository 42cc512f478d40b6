//! The listening socket.
//!
//! Built with socket2 one step at a time so that creation, bind and listen
//! each fail with their own error, then handed to std for blocking accepts.

use crate::connection::Connection;
use crate::error::FatalError;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener};

/// Source of accepted connections.
pub trait Accept {
    type Conn: Send + 'static;

    /// Block until a client connects.
    fn accept(&self) -> io::Result<(Self::Conn, SocketAddr)>;
}

/// A bound, listening TCP socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Create a socket for `addr`'s family, bind it, and listen with
    /// `backlog` pending connections.
    pub fn bind(addr: SocketAddr, backlog: i32) -> Result<Self, FatalError> {
        let domain = match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(FatalError::Socket)?;

        if addr.is_ipv6() {
            socket.set_only_v6(true).map_err(FatalError::Socket)?;
        }

        socket.bind(&addr.into()).map_err(FatalError::Bind)?;
        Self::listen(socket, backlog)
    }

    /// Start listening on an already bound socket.
    fn listen(socket: Socket, backlog: i32) -> Result<Self, FatalError> {
        socket.listen(backlog).map_err(FatalError::Listen)?;

        let inner: TcpListener = socket.into();
        let local_addr = inner.local_addr().map_err(FatalError::Bind)?;

        Ok(Self { inner, local_addr })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Accept for Listener {
    type Conn = Connection;

    fn accept(&self) -> io::Result<(Connection, SocketAddr)> {
        let (stream, peer) = self.inner.accept()?;
        Ok((Connection::new(stream, peer), peer))
    }
}

#[cfg(test)]
pub(crate) fn ipv6_loopback_available() -> bool {
    std::net::TcpListener::bind("[::1]:0").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv6Addr, SocketAddrV6, TcpStream};

    #[test]
    fn test_bind_and_accept() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), 5).unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let client = TcpStream::connect(addr).unwrap();
        let (conn, peer) = listener.accept().unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
        assert_eq!(conn.peer(), peer);
    }

    #[test]
    fn test_bind_ipv6_any() {
        if !ipv6_loopback_available() {
            return;
        }

        let addr = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0));
        let listener = Listener::bind(addr, 5).unwrap();
        assert!(listener.local_addr().is_ipv6());

        let port = listener.local_addr().port();
        let _client = TcpStream::connect((Ipv6Addr::LOCALHOST, port)).unwrap();
        let (_, peer) = listener.accept().unwrap();
        assert!(peer.is_ipv6());
    }

    #[test]
    fn test_bind_conflict_is_bind_error() {
        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), 5).unwrap();
        let result = Listener::bind(first.local_addr(), 5);
        assert!(matches!(result, Err(FatalError::Bind(_))));
    }

    fn reusable_socket() -> Socket {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
        socket.set_reuse_address(true).unwrap();
        socket
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_listen_conflict_is_listen_error() {
        // Two SO_REUSEADDR sockets may share an address while neither is
        // listening; only the first one can then move to listening.
        let first = reusable_socket();
        first
            .bind(&"127.0.0.1:0".parse::<SocketAddr>().unwrap().into())
            .unwrap();
        let addr = first.local_addr().unwrap().as_socket().unwrap();

        let second = reusable_socket();
        second.bind(&addr.into()).unwrap();

        let listening = Listener::listen(first, 5).unwrap();
        assert_eq!(listening.local_addr(), addr);

        let result = Listener::listen(second, 5);
        assert!(matches!(result, Err(FatalError::Listen(_))));
    }
}

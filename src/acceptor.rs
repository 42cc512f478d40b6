//! The accept loop.
//!
//! One thread accepts connections one at a time and offers each to the
//! worker pool before accepting the next. A connection the pool refuses is
//! closed here and the loop moves on. Any accept failure ends the loop with a
//! fatal error; there is no retry.

use crate::config::BACKLOG;
use crate::connection::Connection;
use crate::error::FatalError;
use crate::handoff::HandOff;
use crate::listener::{Accept, Listener};
use crate::pool::WorkerPool;
use std::convert::Infallible;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one accept/hand-off step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The pool took ownership of the connection.
    HandedOff,
    /// The pool refused it and it was closed.
    Dropped,
}

/// Owner of the listening socket.
pub struct Acceptor<L> {
    listener: L,
}

impl Acceptor<Listener> {
    /// Listen on `[::]:port`.
    pub fn initialize(port: u16) -> Result<Self, FatalError> {
        let addr = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0));
        let listener = Listener::bind(addr, BACKLOG)?;

        info!(address = %listener.local_addr(), backlog = BACKLOG, "Listening");
        Ok(Self::new(listener))
    }

    /// Bound address of the listening socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Start `threads` workers that echo each connection they are given.
    pub fn start_pool(
        &self,
        threads: usize,
        read_timeout: Option<Duration>,
    ) -> Result<WorkerPool<Connection>, FatalError> {
        let pool = WorkerPool::start(threads, move |conn: Connection| {
            serve_connection(conn, read_timeout)
        })?;
        Ok(pool)
    }
}

impl<L: Accept> Acceptor<L> {
    pub fn new(listener: L) -> Self {
        Self { listener }
    }

    /// Accept and hand off connections until accepting fails.
    pub fn run<P: HandOff<L::Conn>>(&self, pool: &P) -> Result<Infallible, FatalError> {
        loop {
            self.serve_one(pool)?;
        }
    }

    /// Accept one connection and offer it to `pool`.
    pub fn serve_one<P: HandOff<L::Conn>>(&self, pool: &P) -> Result<Dispatch, FatalError> {
        let (conn, peer) = self.listener.accept().map_err(FatalError::Accept)?;
        info!(peer_addr = %peer.ip(), peer_port = peer.port(), "Connection accepted");

        match pool.offer(conn) {
            Ok(()) => {
                debug!(peer = %peer, "Client handed off to worker pool");
                Ok(Dispatch::HandedOff)
            }
            Err(rejected) => {
                warn!(peer = %peer, reason = %rejected, "Failed to hand off client, dropping connection");
                // The handle is ours again; dropping it closes the socket.
                drop(rejected.into_inner());
                Ok(Dispatch::Dropped)
            }
        }
    }

    /// Close the listening socket, then stop the pool once its admitted
    /// connections are done.
    pub fn shutdown(self, pool: WorkerPool<L::Conn>) {
        drop(self.listener);
        pool.shutdown();
        info!("Acceptor stopped");
    }
}

fn serve_connection(conn: Connection, read_timeout: Option<Duration>) {
    let peer = conn.peer();
    match conn.echo(read_timeout) {
        Ok(bytes) => debug!(peer = %peer, bytes, "Client processed"),
        Err(e) => debug!(peer = %peer, error = %e, "Connection ended with error"),
    }
}

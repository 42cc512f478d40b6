//! Accepted client connections and the echo exchange.
//!
//! A `Connection` is the unique owner of one accepted TCP stream. It is not
//! `Clone`; handing it to another thread moves it, and the socket is closed
//! exactly once, when the value is dropped by whoever holds it.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, trace};

/// Read buffer size for the echo loop.
const BUFFER_SIZE: usize = 16 * 1024;

/// A live client connection.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Wrap an accepted stream.
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Remote address of the client.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Echo everything the client sends until it disconnects, an I/O error
    /// occurs, or the client stays silent longer than `read_timeout`.
    ///
    /// Consumes the connection; the socket is closed on return. Returns the
    /// number of bytes echoed.
    pub fn echo(mut self, read_timeout: Option<Duration>) -> io::Result<u64> {
        self.stream.set_read_timeout(read_timeout)?;

        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let n = match self.stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = %self.peer, echoed = total, error = %e, "Read failed");
                    return Err(e);
                }
            };

            self.stream.write_all(&buffer[..n])?;
            total += n as u64;
            trace!(peer = %self.peer, bytes = n, "Echoed");
        }

        debug!(peer = %self.peer, echoed = total, "Client disconnected");
        Ok(total)
    }
}

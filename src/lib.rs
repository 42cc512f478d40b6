//! v6-echo: an IPv6 TCP echo server.
//!
//! A single acceptor thread accepts connections and hands each one, by
//! value, to a fixed-size pool of worker threads that echo the client's
//! bytes back until it disconnects. Connections the pool cannot take right
//! away are closed by the acceptor. Setup and accept failures are fatal.

pub mod acceptor;
pub mod config;
pub mod connection;
pub mod error;
pub mod handoff;
pub mod listener;
pub mod pool;
pub mod server;

#[cfg(test)]
mod testing;

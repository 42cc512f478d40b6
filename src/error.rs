//! Error types and the fatal-error reporter.
//!
//! Every unrecoverable condition maps to one `FatalError` variant with its
//! own message. `fatal` is the single place that reports one and terminates
//! the process.

use std::io;
use tracing::error;

/// Conditions that terminate the server.
#[derive(Debug)]
pub enum FatalError {
    /// The listening socket could not be created.
    Socket(io::Error),
    /// The listening socket could not be bound.
    Bind(io::Error),
    /// The bound socket could not be set to listen.
    Listen(io::Error),
    /// The worker pool could not be started.
    PoolInit(PoolError),
    /// Accepting a client connection failed.
    Accept(io::Error),
}

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalError::Socket(e) => write!(f, "failed to create listening socket: {}", e),
            FatalError::Bind(e) => write!(f, "failed to bind listening socket: {}", e),
            FatalError::Listen(e) => write!(f, "failed to set listening socket to listen: {}", e),
            FatalError::PoolInit(e) => write!(f, "failed to initialize worker pool: {}", e),
            FatalError::Accept(e) => write!(f, "failed to accept client connection: {}", e),
        }
    }
}

impl std::error::Error for FatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FatalError::Socket(e)
            | FatalError::Bind(e)
            | FatalError::Listen(e)
            | FatalError::Accept(e) => Some(e),
            FatalError::PoolInit(e) => Some(e),
        }
    }
}

impl From<PoolError> for FatalError {
    fn from(e: PoolError) -> Self {
        FatalError::PoolInit(e)
    }
}

/// Worker pool start-up errors.
#[derive(Debug)]
pub enum PoolError {
    /// A pool needs at least one worker.
    NoWorkers,
    /// The OS refused to spawn a worker thread.
    Spawn(usize, io::Error),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::NoWorkers => write!(f, "thread count must be at least 1"),
            PoolError::Spawn(id, e) => write!(f, "failed to spawn worker-{}: {}", id, e),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::NoWorkers => None,
            PoolError::Spawn(_, e) => Some(e),
        }
    }
}

/// Report an unrecoverable error and terminate the process.
///
/// No cleanup is attempted; in-flight connections are closed by the OS.
pub fn fatal(err: &FatalError) -> ! {
    error!(error = %err, "Fatal error, exiting");
    eprintln!("Fatal error: {}", err);
    std::process::exit(1);
}

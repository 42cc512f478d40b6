//! Server bootstrap: listen, start the workers, then serve forever.

use crate::acceptor::Acceptor;
use crate::config::{Config, PortSource, DEFAULT_PORT};
use crate::error::FatalError;
use crate::listener::Accept;
use crate::pool::WorkerPool;
use std::convert::Infallible;
use tracing::{info, warn};

/// Bring the server up and run the accept loop.
///
/// Only returns on a fatal error, and does so without waiting for
/// connections still being served.
pub fn run(config: &Config) -> Result<Infallible, FatalError> {
    match &config.port_source {
        PortSource::Default => info!("No port provided, using the default port {}", DEFAULT_PORT),
        PortSource::Invalid(arg) => warn!(
            argument = %arg,
            "Invalid port argument, using the default port {}",
            DEFAULT_PORT
        ),
        PortSource::Argument | PortSource::File => {}
    }

    let acceptor = Acceptor::initialize(config.port)?;
    let pool = acceptor.start_pool(config.workers, config.read_timeout)?;

    info!(
        port = acceptor.local_addr().port(),
        workers = pool.size(),
        "IPv6 echo server with worker pool is ready"
    );

    serve(&acceptor, pool)
}

/// Run the accept loop against `pool` until it fails.
///
/// The pool is abandoned rather than shut down on failure: joining its
/// workers would hold the process hostage to its slowest client.
pub fn serve<L: Accept>(
    acceptor: &Acceptor<L>,
    pool: WorkerPool<L::Conn>,
) -> Result<Infallible, FatalError> {
    match acceptor.run(&pool) {
        Ok(never) => match never {},
        Err(e) => {
            pool.abandon();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ipv6_loopback_available;
    use crate::testing::{Log, ScriptedListener, Tracked};
    use std::io;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_accept_failure_returns_without_draining_pool() {
        let (started_tx, started_rx) = mpsc::channel();
        let (_release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        // The handler holds its connection until released, like an idle
        // client with no read timeout.
        let pool = WorkerPool::start(1, move |h: Tracked| {
            started_tx.send(h.id).unwrap();
            let _ = release_rx.lock().unwrap().recv();
        })
        .unwrap();

        let log = Log::default();
        let listener = ScriptedListener::new(
            vec![Ok(1), Err(io::Error::other("accept failed"))],
            &log,
        );
        let acceptor = Acceptor::new(listener);

        let (result_tx, result_rx) = mpsc::channel();
        thread::spawn(move || {
            result_tx.send(serve(&acceptor, pool)).unwrap();
        });

        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);

        let result = result_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("fatal error must not wait for in-flight connections");
        assert!(matches!(result, Err(FatalError::Accept(_))));
    }

    #[test]
    fn test_pool_init_failure_is_fatal() {
        if !ipv6_loopback_available() {
            return;
        }

        let config = Config {
            port: 0,
            port_source: PortSource::Default,
            workers: 0,
            read_timeout: None,
            log_level: "info".to_string(),
        };

        let result = run(&config);
        assert!(matches!(result, Err(FatalError::PoolInit(_))));
    }

    #[test]
    fn test_bind_failure_is_fatal() {
        if !ipv6_loopback_available() {
            return;
        }

        let taken = Acceptor::initialize(0).unwrap();
        let config = Config {
            port: taken.local_addr().port(),
            port_source: PortSource::Argument,
            workers: 1,
            read_timeout: None,
            log_level: "info".to_string(),
        };

        let result = run(&config);
        assert!(matches!(result, Err(FatalError::Bind(_))));
    }
}

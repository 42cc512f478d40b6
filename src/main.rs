//! v6-echo: an IPv6 TCP echo server with a worker thread pool.
//!
//! Usage: `v6-echo [PORT]` (default port 5000). See `--help` for the
//! remaining options.

use tracing_subscriber::EnvFilter;
use v6_echo::config::Config;
use v6_echo::error::fatal;
use v6_echo::server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match server::run(&config) {
        Ok(never) => match never {},
        Err(e) => fatal(&e),
    }
}

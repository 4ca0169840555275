//! Tracing setup.
//!
//! The filter comes from `PUGLS_LOG`, falling back to `RUST_LOG`, and
//! defaults to `info`. Values use the `RUST_LOG` syntax
//! (`pugls::workspace=debug`).
//!
//! Everything goes to stderr: stdout carries the JSON-RPC stream when
//! serving and the results of the `index`/`deps` subcommands otherwise.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn build_filter() -> EnvFilter {
    match std::env::var("PUGLS_LOG").or_else(|_| std::env::var("RUST_LOG")) {
        Ok(val) => EnvFilter::builder().parse_lossy(val),
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

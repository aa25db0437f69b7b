//! Courier operator CLI
//!
//! Inspect the limits the rate limiter resolves for each provider and run
//! synthetic workloads against an in-process fake provider.
//!
//! # Commands
//!
//! - `courier config show [--provider P] [--json]`: print resolved limits,
//!   including any `COURIER_RATE_LIMIT_*` overrides from the environment
//! - `courier simulate --provider P --accounts N --calls M --failure-rate F`:
//!   drive `M` calls for each of `N` accounts through the rate-limited client
//!
//! Set `RUST_LOG=courier_core=debug` (or pass `--verbose`) to see lifecycle
//! events as they happen.

// Allow common clippy lints that are stylistic preferences
#![allow(clippy::collapsible_if)]

mod args;
mod commands;
mod console;
mod router;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use args::{Cli, Commands, ConfigAction, SimulateArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    router::route(cli).await
}

/// Initialize logging. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool, json: bool) {
    let default_directive = if verbose { "courier_core=debug,courier=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

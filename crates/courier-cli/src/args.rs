//! CLI argument definitions using clap

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Courier - per-account rate limiting for email/calendar provider APIs")]
#[command(
    long_about = r#"Courier - per-account rate limiting for email/calendar provider APIs

USAGE:
  courier config show                      # Limits for every provider
  courier config show --provider gmail     # Limits for one provider
  courier simulate --provider gmail --accounts 4 --calls 50

Limits can be overridden with COURIER_RATE_LIMIT_<PROVIDER>_<FIELD>
environment variables, e.g. COURIER_RATE_LIMIT_GMAIL_MAX_CONCURRENT=8.
A .env file in the working directory is loaded when present."#
)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging for courier crates
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect resolved rate limit configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run a synthetic workload through the rate-limited client
    Simulate(SimulateArgs),
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Show resolved limits and registry settings
    Show {
        /// Provider name or alias (all providers when omitted)
        #[arg(long)]
        provider: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Provider name or alias every simulated account belongs to
    #[arg(long, default_value = "gmail")]
    pub provider: String,

    /// Number of simulated accounts (resource keys)
    #[arg(long, default_value_t = 4)]
    pub accounts: usize,

    /// Calls issued per account
    #[arg(long, default_value_t = 50)]
    pub calls: usize,

    /// Probability that an attempt fails with a transient 503
    #[arg(long, default_value_t = 0.05)]
    pub failure_rate: f64,

    /// Probability that an attempt is answered with a 429
    #[arg(long, default_value_t = 0.02)]
    pub rate_limit_rate: f64,

    /// Simulated provider latency per attempt, in milliseconds
    #[arg(long, default_value_t = 40)]
    pub latency_ms: u64,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

//! Command routing logic for CLI

use crate::args::{Cli, Commands, ConfigAction};
use crate::commands;

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Config { action } => route_config(action).await,
        Commands::Simulate(args) => commands::simulate::run(args).await,
    }
}

async fn route_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show { provider, json } => {
            commands::config::show(provider.as_deref(), json).await
        }
    }
}

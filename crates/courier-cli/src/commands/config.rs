//! Configuration inspection commands

use anyhow::Context;
use colored::*;
use courier_core::{EnvOverrides, Provider, RateLimitConfig, RegistrySettings};
use serde::Serialize;

use crate::console::CliConsole;

#[derive(Serialize)]
struct ResolvedConfig {
    providers: Vec<RateLimitConfig>,
    registry: RegistrySettings,
}

/// Show resolved limits for one provider, or all of them
pub async fn show(provider: Option<&str>, json: bool) -> anyhow::Result<()> {
    let console = CliConsole::new(json);

    let providers: Vec<RateLimitConfig> = match provider {
        Some(name) => {
            let config = RateLimitConfig::resolve(name, &EnvOverrides);
            if config.provider == Provider::Other && !name.trim().eq_ignore_ascii_case("other") {
                console.warn(&format!(
                    "Unknown provider '{}', showing the limits applied to unrecognized providers",
                    name
                ));
            }
            vec![config]
        }
        None => Provider::ALL
            .iter()
            .map(|p| RateLimitConfig::for_provider(*p, &EnvOverrides))
            .collect(),
    };
    let registry = RegistrySettings::from_env().context("reading registry settings")?;

    if json {
        let resolved = ResolvedConfig {
            providers,
            registry,
        };
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    console.section("registry");
    console.field("max cached limiters", registry.max_cached_limiters);
    console.field(
        "limiter cache timeout",
        format!("{:?}", registry.limiter_cache_timeout),
    );

    for config in &providers {
        console.section(&format!("provider {}", config.provider));
        print_limits(&console, config);
    }
    Ok(())
}

fn print_limits(console: &CliConsole, config: &RateLimitConfig) {
    console.field("max concurrent", config.max_concurrent);
    console.field("min time", format!("{:?}", config.min_time));
    console.field("reservoir size", config.reservoir_size);
    console.field("reservoir refresh amount", config.reservoir_refresh_amount);
    console.field(
        "reservoir refresh interval",
        format!("{:?}", config.reservoir_refresh_interval),
    );
    console.field("max retries", config.max_retries);
    console.field("initial retry delay", format!("{:?}", config.initial_retry_delay));
    console.field("max retry delay", format!("{:?}", config.max_retry_delay));
    console.field(
        "worst-case backoff",
        format!("{:?}", config.worst_case_backoff()).dimmed(),
    );
}

//! Synthetic workload against an in-process fake provider

use anyhow::Context;
use colored::*;
use courier_core::{
    ApiError, CallError, EnvOverrides, EventKind, FailureClass, RateLimitEvent, RateLimitSink,
    RateLimitedClient, RegistrySettings, RegistryStats, ResourceKind, StaticProviderLookup,
    TracingSink,
};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::args::SimulateArgs;
use crate::console::CliConsole;

/// Counts events per kind and forwards them to the tracing sink
#[derive(Default)]
struct SimulationSink {
    counts: Mutex<HashMap<EventKind, u64>>,
    inner: TracingSink,
}

impl SimulationSink {
    fn counts(&self) -> HashMap<EventKind, u64> {
        self.counts.lock().clone()
    }
}

impl RateLimitSink for SimulationSink {
    fn record(&self, event: RateLimitEvent) {
        *self.counts.lock().entry(event.kind).or_insert(0) += 1;
        self.inner.record(event);
    }
}

/// Provider stand-in that answers after a jittered latency
struct FakeProvider {
    failure_rate: f64,
    rate_limit_rate: f64,
    latency: Duration,
}

impl FakeProvider {
    /// Decide the outcome up front; the returned future only waits.
    fn attempt(&self) -> impl Future<Output = Result<(), ApiError>> + Send + 'static {
        let mut rng = rand::thread_rng();
        let latency = if self.latency.is_zero() {
            Duration::ZERO
        } else {
            let base = self.latency.as_millis() as u64;
            Duration::from_millis(rng.gen_range(base / 2..=base + base / 2))
        };

        let outcome = if rng.gen_bool(self.rate_limit_rate) {
            let mut error =
                ApiError::status(429, "Rate limit exceeded").with_code("rate_limit_exceeded");
            if rng.gen_bool(0.5) {
                error = error.with_retry_after(Duration::from_millis(500));
            }
            Err(error)
        } else if rng.gen_bool(self.failure_rate) {
            Err(ApiError::status(503, "Service unavailable"))
        } else {
            Ok(())
        };

        async move {
            tokio::time::sleep(latency).await;
            outcome
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct Outcomes {
    succeeded: u64,
    rate_limit_exhausted: u64,
    transient_exhausted: u64,
    non_retryable: u64,
}

impl Outcomes {
    fn record(&mut self, result: &Result<(), CallError<ApiError>>) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(err) => match err.class() {
                FailureClass::RateLimit => self.rate_limit_exhausted += 1,
                FailureClass::Transient => self.transient_exhausted += 1,
                FailureClass::NonRetryable => self.non_retryable += 1,
            },
        }
    }
}

#[derive(Serialize)]
struct SimulationSummary {
    provider: String,
    accounts: usize,
    calls_per_account: usize,
    #[serde(with = "humantime_serde")]
    elapsed: Duration,
    outcomes: Outcomes,
    events: HashMap<EventKind, u64>,
    registry: RegistryStats,
}

fn validate(args: &SimulateArgs) -> anyhow::Result<()> {
    if args.accounts == 0 || args.calls == 0 {
        anyhow::bail!("--accounts and --calls must both be at least 1");
    }
    for (name, rate) in [
        ("--failure-rate", args.failure_rate),
        ("--rate-limit-rate", args.rate_limit_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            anyhow::bail!("{} must be between 0 and 1, got {}", name, rate);
        }
    }
    Ok(())
}

/// Drive `accounts * calls` calls through a rate-limited client
pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    validate(&args)?;
    let console = CliConsole::new(args.json);

    let settings = RegistrySettings::from_env().context("reading registry settings")?;
    let sink = Arc::new(SimulationSink::default());
    let client = RateLimitedClient::builder()
        .with_lookup(Arc::new(StaticProviderLookup::uniform(args.provider.clone())))
        .with_overrides(Arc::new(EnvOverrides))
        .with_sink(sink.clone())
        .with_settings(settings)
        .build();
    let provider = Arc::new(FakeProvider {
        failure_rate: args.failure_rate,
        rate_limit_rate: args.rate_limit_rate,
        latency: Duration::from_millis(args.latency_ms),
    });

    let total = (args.accounts * args.calls) as u64;
    console.note(&format!(
        "Simulating {} calls across {} accounts on provider '{}'",
        total, args.accounts, args.provider
    ));

    let progress = if args.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total)
    };
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    tracing::debug!(
        provider = %args.provider,
        accounts = args.accounts,
        calls = args.calls,
        "starting simulation"
    );
    let started = Instant::now();
    let mut pending = FuturesUnordered::new();
    for account in 0..args.accounts {
        for call in 0..args.calls {
            let client = client.clone();
            let provider = provider.clone();
            let key = format!("account-{account}");
            let kind = ResourceKind::ALL[call % ResourceKind::ALL.len()];
            pending.push(async move { client.list(&key, kind, || provider.attempt()).await });
        }
    }

    let mut outcomes = Outcomes::default();
    while let Some(result) = pending.next().await {
        outcomes.record(&result);
        progress.inc(1);
        progress.set_message(format!("{} ok", outcomes.succeeded));
    }
    progress.finish_and_clear();

    let summary = SimulationSummary {
        provider: args.provider.clone(),
        accounts: args.accounts,
        calls_per_account: args.calls,
        elapsed: started.elapsed(),
        outcomes,
        events: sink.counts(),
        registry: client.stats(),
    };
    client.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_summary(&console, &summary);
    Ok(())
}

fn print_summary(console: &CliConsole, summary: &SimulationSummary) {
    console.section("simulation");
    console.field("provider", &summary.provider);
    console.field("accounts", summary.accounts);
    console.field("calls per account", summary.calls_per_account);
    console.field("elapsed", format!("{:.2?}", summary.elapsed));

    console.section("outcomes");
    console.field("succeeded", summary.outcomes.succeeded.to_string().green());
    console.field("rate limit exhausted", summary.outcomes.rate_limit_exhausted);
    console.field("transient exhausted", summary.outcomes.transient_exhausted);
    console.field("non-retryable", summary.outcomes.non_retryable);

    console.section("events");
    for kind in [
        EventKind::Queued,
        EventKind::Executing,
        EventKind::Limited,
        EventKind::Retry,
        EventKind::Failed,
    ] {
        console.event_count(kind, summary.events.get(&kind).copied().unwrap_or(0));
    }

    console.section("limiters");
    for limiter in &summary.registry.resources {
        console.field(
            &limiter.resource_key,
            format!(
                "reservoir {} | running {}/{} | queued {}",
                limiter.reservoir, limiter.running, limiter.max_concurrent, limiter.queued
            ),
        );
    }
    console.rule();

    let failed = summary.outcomes.rate_limit_exhausted
        + summary.outcomes.transient_exhausted
        + summary.outcomes.non_retryable;
    if failed == 0 {
        console.success("All calls completed");
    } else {
        console.warn(&format!("{} calls failed terminally", failed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SimulateArgs {
        SimulateArgs {
            provider: "gmail".to_string(),
            accounts: 2,
            calls: 3,
            failure_rate: 0.0,
            rate_limit_rate: 0.0,
            latency_ms: 0,
            json: true,
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range_rates() {
        assert!(validate(&args()).is_ok());

        let mut bad = args();
        bad.failure_rate = 1.5;
        assert!(validate(&bad).is_err());

        let mut bad = args();
        bad.rate_limit_rate = -0.1;
        assert!(validate(&bad).is_err());

        let mut bad = args();
        bad.accounts = 0;
        assert!(validate(&bad).is_err());
    }

    #[tokio::test]
    async fn test_fake_provider_outcomes() {
        let always_503 = FakeProvider {
            failure_rate: 1.0,
            rate_limit_rate: 0.0,
            latency: Duration::ZERO,
        };
        let err = always_503.attempt().await.unwrap_err();
        assert_eq!(err.status, Some(503));

        let always_429 = FakeProvider {
            failure_rate: 0.0,
            rate_limit_rate: 1.0,
            latency: Duration::ZERO,
        };
        let err = always_429.attempt().await.unwrap_err();
        assert_eq!(err.status, Some(429));

        let healthy = FakeProvider {
            failure_rate: 0.0,
            rate_limit_rate: 0.0,
            latency: Duration::ZERO,
        };
        assert!(healthy.attempt().await.is_ok());
    }

    #[test]
    fn test_outcomes_bucket_by_class() {
        let mut outcomes = Outcomes::default();
        outcomes.record(&Ok(()));
        outcomes.record(&Ok(()));
        assert_eq!(outcomes.succeeded, 2);
        assert_eq!(outcomes.non_retryable, 0);
    }

    #[test]
    fn test_simulation_sink_counts() {
        let sink = SimulationSink::default();
        sink.record(RateLimitEvent::new(
            EventKind::Queued,
            "account-0",
            courier_core::Provider::Gmail,
            "messages.list",
        ));
        sink.record(RateLimitEvent::new(
            EventKind::Queued,
            "account-1",
            courier_core::Provider::Gmail,
            "messages.list",
        ));
        assert_eq!(sink.counts().get(&EventKind::Queued), Some(&2));
        assert_eq!(sink.counts().get(&EventKind::Failed), None);
    }
}

//! End-to-end scenarios through the public client API

use courier_core::events::{BroadcastSink, MemorySink};
use courier_core::{
    ApiError, EventKind, OverrideSource, Provider, RateLimitedClient, RegistrySettings,
    ResourceKind, StaticProviderLookup,
};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn overrides(pairs: &[(&str, &str)]) -> Arc<dyn OverrideSource> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Arc::new(map)
}

fn gmail_client(
    overrides: Arc<dyn OverrideSource>,
    settings: RegistrySettings,
) -> (RateLimitedClient, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let client = RateLimitedClient::builder()
        .with_lookup(Arc::new(StaticProviderLookup::uniform("gmail")))
        .with_overrides(overrides)
        .with_sink(sink.clone())
        .with_settings(settings)
        .build();
    (client, sink)
}

#[tokio::test(start_paused = true)]
async fn gmail_reservoir_holds_overflow_until_refresh() {
    // Spacing disabled so only the reservoir can delay the tail
    let (client, sink) = gmail_client(
        overrides(&[("COURIER_RATE_LIMIT_GMAIL_MIN_TIME_MS", "0")]),
        RegistrySettings::default(),
    );
    let origin = Instant::now();
    let starts = Arc::new(Mutex::new(Vec::new()));

    let calls = (0..610).map(|i| {
        let client = client.clone();
        let starts = starts.clone();
        async move {
            client
                .list("grant-gmail", ResourceKind::Messages, move || {
                    let starts = starts.clone();
                    async move {
                        starts.lock().push((i, origin.elapsed()));
                        Ok::<_, ApiError>(i)
                    }
                })
                .await
        }
    });
    let results = join_all(calls).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let starts = starts.lock().clone();
    assert_eq!(starts.len(), 610);
    let before_refresh = starts
        .iter()
        .filter(|(_, at)| *at < Duration::from_secs(60))
        .count();
    assert_eq!(before_refresh, 600);

    let mut tail: Vec<usize> = starts
        .iter()
        .filter(|(_, at)| *at >= Duration::from_secs(60))
        .map(|(i, _)| *i)
        .collect();
    tail.sort_unstable();
    assert_eq!(tail, (600..610).collect::<Vec<_>>());

    assert_eq!(sink.of_kind(EventKind::Limited).len(), 1);
    assert_eq!(client.stats().resources[0].reservoir, 590);
}

#[tokio::test(start_paused = true)]
async fn gmail_default_spacing_paces_starts() {
    let (client, _) = gmail_client(overrides(&[]), RegistrySettings::default());
    let starts = Arc::new(Mutex::new(Vec::new()));

    let calls = (0..10).map(|_| {
        let client = client.clone();
        let starts = starts.clone();
        async move {
            client
                .find("grant-gmail", ResourceKind::Threads, move || {
                    let starts = starts.clone();
                    async move {
                        starts.lock().push(Instant::now());
                        Ok::<_, ApiError>(())
                    }
                })
                .await
        }
    });
    join_all(calls).await;

    let mut starts = starts.lock().clone();
    starts.sort();
    for pair in starts.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_succeeds() {
    let (client, sink) = gmail_client(overrides(&[]), RegistrySettings::default());
    let attempts = Arc::new(Mutex::new(Vec::new()));

    let result = client
        .send_message("grant-gmail", || {
            let attempts = attempts.clone();
            async move {
                let mut attempts = attempts.lock();
                attempts.push(Instant::now());
                if attempts.len() <= 2 {
                    Err(ApiError::status(429, "Too Many Requests"))
                } else {
                    Ok("sent")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "sent");
    let attempts = attempts.lock().clone();
    assert_eq!(attempts.len(), 3);

    let first = attempts[1].duration_since(attempts[0]).as_millis();
    let second = attempts[2].duration_since(attempts[1]).as_millis();
    assert!((1000..=2000).contains(&first), "first backoff {first}ms");
    assert!((2000..=3000).contains(&second), "second backoff {second}ms");

    assert_eq!(sink.of_kind(EventKind::Limited).len(), 2);
    assert_eq!(sink.of_kind(EventKind::Retry).len(), 2);
    assert!(sink.of_kind(EventKind::Failed).is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_classification() {
    let (client, _) = gmail_client(overrides(&[]), RegistrySettings::default());
    let count = Arc::new(Mutex::new(0u32));

    let error = client
        .update("grant-gmail", ResourceKind::Events, || {
            let count = count.clone();
            async move {
                *count.lock() += 1;
                Err::<(), _>(ApiError::status(429, "quota").with_code("rate_limit_exceeded"))
            }
        })
        .await
        .unwrap_err();

    assert_eq!(*count.lock(), 4);
    assert!(error.is_rate_limit());
    assert!(error.is_exhausted());
    assert_eq!(error.context().provider, Provider::Gmail);
    assert!(error.to_string().contains("events.update"));
}

#[tokio::test(start_paused = true)]
async fn idle_limiter_is_recreated_with_full_budget() {
    let (client, _) = gmail_client(
        overrides(&[
            ("COURIER_RATE_LIMIT_GMAIL_RESERVOIR_SIZE", "3"),
            ("COURIER_RATE_LIMIT_GMAIL_MIN_TIME_MS", "0"),
        ]),
        RegistrySettings::default().with_cache_timeout(Duration::from_secs(5)),
    );

    for _ in 0..3 {
        client
            .delete("grant-gmail", ResourceKind::Drafts, || async { Ok::<_, ApiError>(()) })
            .await
            .unwrap();
    }
    assert_eq!(client.stats().resources[0].reservoir, 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.stats().limiters, 0);

    let start = Instant::now();
    for _ in 0..3 {
        client
            .delete("grant-gmail", ResourceKind::Drafts, || async { Ok::<_, ApiError>(()) })
            .await
            .unwrap();
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(client.stats().resources[0].reservoir, 0);
}

#[tokio::test(start_paused = true)]
async fn broadcast_subscribers_observe_lifecycle() {
    let sink = Arc::new(BroadcastSink::new(64));
    let mut events = sink.subscribe();
    let client = RateLimitedClient::builder()
        .with_lookup(Arc::new(StaticProviderLookup::uniform("outlook")))
        .with_overrides(overrides(&[]))
        .with_sink(sink.clone())
        .build();

    client
        .create("grant-outlook", ResourceKind::Contacts, || async { Ok::<_, ApiError>(()) })
        .await
        .unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::Executing);
    assert_eq!(event.provider, Provider::Outlook);
    assert_eq!(event.operation, "contacts.create");
}

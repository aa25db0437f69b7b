//! Tests for the rate-limited client façade

use super::*;
use crate::config::{OverrideSource, Provider, RegistrySettings};
use crate::events::{EventKind, MemorySink};
use crate::limiter::StaticProviderLookup;
use crate::retry::{ApiError, FailureClass};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn serial_gmail() -> Arc<dyn OverrideSource> {
    let overrides: HashMap<String, String> = [
        ("COURIER_RATE_LIMIT_GMAIL_MAX_CONCURRENT", "1"),
        ("COURIER_RATE_LIMIT_GMAIL_MIN_TIME_MS", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Arc::new(overrides)
}

fn client(overrides: Arc<dyn OverrideSource>) -> (RateLimitedClient, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let client = RateLimitedClient::builder()
        .with_lookup(Arc::new(StaticProviderLookup::uniform("gmail")))
        .with_overrides(overrides)
        .with_sink(sink.clone())
        .with_settings(RegistrySettings::default())
        .build();
    (client, sink)
}

#[test]
fn test_operation_names() {
    assert_eq!(Operation::list(ResourceKind::Messages).as_str(), "messages.list");
    assert_eq!(Operation::find(ResourceKind::Threads).as_str(), "threads.find");
    assert_eq!(Operation::create(ResourceKind::Drafts).as_str(), "drafts.create");
    assert_eq!(Operation::update(ResourceKind::Events).as_str(), "events.update");
    assert_eq!(Operation::delete(ResourceKind::Contacts).as_str(), "contacts.delete");
    assert_eq!(Operation::send_message().as_str(), "messages.send");
    assert_eq!(Operation::from("grant.identity").to_string(), "grant.identity");
}

#[tokio::test(start_paused = true)]
async fn test_named_operations_report_their_names() {
    let (client, sink) = client(serial_gmail());

    client
        .list("grant-1", ResourceKind::Folders, || async { Ok::<_, ApiError>(()) })
        .await
        .unwrap();
    client
        .find("grant-1", ResourceKind::Calendars, || async { Ok::<_, ApiError>(()) })
        .await
        .unwrap();
    client
        .send_message("grant-1", || async { Ok::<_, ApiError>(()) })
        .await
        .unwrap();

    let names: Vec<String> = sink
        .of_kind(EventKind::Executing)
        .into_iter()
        .map(|e| e.operation)
        .collect();
    assert_eq!(names, vec!["folders.list", "calendars.find", "messages.send"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_reenters_admission_behind_waiting_work() {
    let (client, sink) = client(serial_gmail());
    let attempts = Arc::new(AtomicU32::new(0));

    let flaky = {
        let attempts = attempts.clone();
        client.list("grant-1", ResourceKind::Messages, move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if attempt == 0 {
                    Err(ApiError::status(503, "unavailable"))
                } else {
                    Ok("listed")
                }
            }
        })
    };
    let waiting = async {
        tokio::task::yield_now().await;
        client
            .create("grant-1", ResourceKind::Drafts, || async { Ok::<_, ApiError>("created") })
            .await
    };

    let (flaky, waiting) = tokio::join!(flaky, waiting);
    assert_eq!(flaky.unwrap(), "listed");
    assert_eq!(waiting.unwrap(), "created");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    let order: Vec<String> = sink
        .of_kind(EventKind::Executing)
        .into_iter()
        .map(|e| e.operation)
        .collect();
    assert_eq!(order, vec!["messages.list", "drafts.create", "messages.list"]);
    assert_eq!(sink.of_kind(EventKind::Retry).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_thunk_is_not_invoked_while_queued() {
    let (client, _) = client(serial_gmail());
    let invocations = Arc::new(AtomicU32::new(0));

    let holder = client.list("grant-1", ResourceKind::Messages, || async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, ApiError>(())
    });
    let counter = invocations.clone();
    let queued = async {
        tokio::task::yield_now().await;
        client
            .create("grant-1", ResourceKind::Drafts, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ApiError>(()) }
            })
            .await
    };
    let observed = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        (client.stats().queued, invocations.load(Ordering::SeqCst))
    };

    let (holder, queued, (queued_at_1s, invoked_at_1s)) = tokio::join!(holder, queued, observed);
    holder.unwrap();
    queued.unwrap();
    assert_eq!(queued_at_1s, 1);
    assert_eq!(invoked_at_1s, 0);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_carries_metadata() {
    let (client, sink) = client(serial_gmail());

    let error = client
        .delete("grant-7", ResourceKind::Messages, || async {
            Err::<(), _>(ApiError::status(404, "no such message"))
        })
        .await
        .unwrap_err();

    assert_eq!(error.class(), FailureClass::NonRetryable);
    let context = error.context();
    assert_eq!(context.resource_key, "grant-7");
    assert_eq!(context.provider, Provider::Gmail);
    assert_eq!(context.operation, "messages.delete");
    assert_eq!(context.attempts, 1);
    assert_eq!(sink.of_kind(EventKind::Failed).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_keys_do_not_block_each_other() {
    let (client, _) = client(serial_gmail());

    let slow = client.update("grant-a", ResourceKind::Events, || async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, ApiError>(())
    });
    let fast = async {
        tokio::task::yield_now().await;
        let start = Instant::now();
        client
            .list("grant-b", ResourceKind::Events, || async { Ok::<_, ApiError>(()) })
            .await
            .unwrap();
        start.elapsed()
    };

    let (slow, fast_elapsed) = tokio::join!(slow, fast);
    slow.unwrap();
    assert_eq!(fast_elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_bypass_skips_limiter() {
    let (client, sink) = client(serial_gmail());

    let identity = client
        .bypass(Operation::new("grant.identity"), || async { "me@example.com" })
        .await;

    assert_eq!(identity, "me@example.com");
    assert!(client.registry().is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stats_passthrough() {
    let (client, _) = client(serial_gmail());
    client
        .list("grant-1", ResourceKind::Threads, || async { Ok::<_, ApiError>(()) })
        .await
        .unwrap();

    let stats = client.stats();
    assert_eq!(stats.limiters, 1);
    assert_eq!(stats.resources[0].resource_key, "grant-1");
    assert_eq!(stats.resources[0].provider, Provider::Gmail);
    assert_eq!(stats.resources[0].max_concurrent, 1);
    assert_eq!(stats.resources[0].reservoir, 599);
}

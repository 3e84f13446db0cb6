use std::sync::Arc;
use std::time::Duration;

use authtrail_core::memory::{InMemoryDirectory, InMemorySource, MemorySink};
use authtrail_core::{
    AuthHistoryEntry, BatchResolver, Envelope, HistorySink, Identity, ResolverConfig, SourceError,
};
use authtrail_worker::Consumer;
use tokio::sync::mpsc;

fn event(sub: &str) -> Envelope {
    Envelope::new(format!(
        r#"{{"detail":{{"additionalEventData":{{"sub":"{sub}"}}}}}}"#
    ))
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_identity(Identity::new("alice").with_subject_id("abc-1"))
        .with_identity(Identity::new("bob").with_subject_id("def-2"))
        .with_history(
            "alice",
            vec![AuthHistoryEntry::new(
                serde_json::json!({ "eventId": "e1", "eventType": "SignIn" }),
            )],
        )
}

fn consumer(source: InMemorySource) -> (Consumer<InMemorySource, InMemoryDirectory>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let resolver = BatchResolver::new(
        ResolverConfig::new("us-east-1_pool"),
        directory(),
        Arc::clone(&sink) as Arc<dyn HistorySink>,
    )
    .unwrap();
    (
        Consumer::new(source, resolver, Duration::from_millis(1)),
        sink,
    )
}

async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn run_processes_batches_until_shutdown() {
    let source = InMemorySource::new().with_idle_wait(Duration::from_millis(2));
    source.push_batch(vec![event("abc"), event("def")]);
    source.push_batch(vec![event("abc")]);
    let (consumer, sink) = consumer(source);
    let (tx, rx) = mpsc::channel(1);

    tokio::join!(consumer.run(rx), async {
        wait_for(|| consumer.source().acknowledged().len() == 2).await;
        tx.send(()).await.unwrap();
    });

    let acked = consumer.source().acknowledged();
    assert_eq!(acked[0].len(), 2);
    assert_eq!(acked[1].len(), 1);

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].identity.username.as_str(), "alice");
    assert_eq!(records[0].entries.len(), 1);
    assert_eq!(records[1].identity.username.as_str(), "bob");
    assert!(records[1].entries.is_empty());
}

#[tokio::test]
async fn failed_batch_is_left_for_redelivery() {
    let source = InMemorySource::new().with_idle_wait(Duration::from_millis(2));
    source.push_batch(vec![event("abc"), Envelope::new("not json")]);
    source.push_batch(vec![event("def")]);
    let (consumer, sink) = consumer(source);
    let (tx, rx) = mpsc::channel(1);

    tokio::join!(consumer.run(rx), async {
        wait_for(|| consumer.source().acknowledged().len() == 1).await;
        tx.send(()).await.unwrap();
    });

    // Only the second, well-formed batch was acknowledged.
    let acked = consumer.source().acknowledged();
    assert_eq!(acked.len(), 1);
    assert_eq!(acked[0], vec![event("def")]);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.records()[0].identity.username.as_str(), "bob");
}

#[tokio::test]
async fn run_recovers_after_receive_failure() {
    let source = InMemorySource::new().with_idle_wait(Duration::from_millis(2));
    source.push_error(SourceError::Receive("connection reset".into()));
    source.push_batch(vec![event("abc")]);
    let (consumer, _) = consumer(source);
    let (tx, rx) = mpsc::channel(1);

    tokio::join!(consumer.run(rx), async {
        wait_for(|| consumer.source().acknowledged().len() == 1).await;
        tx.send(()).await.unwrap();
    });

    assert_eq!(consumer.source().pending(), 0);
}

#[tokio::test]
async fn shutdown_before_receive_leaves_queue_untouched() {
    let source = InMemorySource::new();
    source.push_batch(vec![event("abc")]);
    let (consumer, sink) = consumer(source);
    let (tx, rx) = mpsc::channel(1);
    tx.send(()).await.unwrap();

    consumer.run(rx).await;

    assert_eq!(consumer.source().pending(), 1);
    assert!(consumer.source().acknowledged().is_empty());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn dropping_sender_stops_consumer() {
    let (consumer, _) = consumer(InMemorySource::new().with_idle_wait(Duration::from_millis(1)));
    let (tx, rx) = mpsc::channel::<()>(1);
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), consumer.run(rx))
        .await
        .expect("consumer should stop when the channel closes");
}

//! End-to-end relay loop behavior over an injected buffer and mock sinks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use firehose_bridge::{shutdown, Bridge, StreamSource};
use record_sink::test_utils::{CollectorSink, FailingSink};
use record_sink::RecordSink;

const POLL: Duration = Duration::from_millis(50);

/// Hand-rolled stream source: liveness flag plus a stop-invocation counter.
#[derive(Debug, Default)]
struct TestSource {
    done: AtomicBool,
    stops: AtomicUsize,
}

impl TestSource {
    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl StreamSource for TestSource {
    fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.done.store(true, Ordering::SeqCst);
    }
}

async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) {
    let started = Instant::now();
    while !cond() {
        if started.elapsed() > limit {
            panic!("condition not met within {limit:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn relays_statuses_in_order_onto_fixed_topic() {
    let (producer, consumer) = relay_buffer::bounded(1000);
    let source = Arc::new(TestSource::default());
    let sink = Arc::new(CollectorSink::new());

    let bridge = Bridge::new(
        consumer,
        source.clone(),
        sink.clone(),
        "twitter_tweets",
        POLL,
    );
    let stats = bridge.stats();
    let loop_task = tokio::spawn(bridge.run());

    for status in ["a", "b", "c"] {
        producer.enqueue(status.to_string()).await.unwrap();
    }

    wait_until(Duration::from_secs(2), || sink.record_count() == 3).await;

    let records = sink.records();
    let payloads: Vec<&str> = records.iter().map(|r| r.payload.as_str()).collect();
    assert_eq!(payloads, vec!["a", "b", "c"]);
    assert!(records.iter().all(|r| r.topic == "twitter_tweets"));
    assert!(records.iter().all(|r| r.key.is_none()));

    source.stop();
    loop_task.await.unwrap();

    wait_until(Duration::from_secs(2), || stats.published() == 3).await;
    assert_eq!(stats.drained(), 3);
    assert_eq!(stats.publish_failures(), 0);
}

#[tokio::test]
async fn rejected_sends_are_dropped_and_loop_continues() {
    let (producer, consumer) = relay_buffer::bounded(16);
    let source = Arc::new(TestSource::default());
    let sink = Arc::new(FailingSink::refuse("broker unreachable"));

    let bridge = Bridge::new(
        consumer,
        source.clone(),
        sink.clone(),
        "twitter_tweets",
        POLL,
    );
    let stats = bridge.stats();
    let loop_task = tokio::spawn(bridge.run());

    for status in ["a", "b", "c"] {
        producer.enqueue(status.to_string()).await.unwrap();
    }

    wait_until(Duration::from_secs(2), || stats.publish_failures() == 3).await;

    // Every drop was counted, nothing stopped the stream.
    assert_eq!(stats.drained(), 3);
    assert_eq!(sink.attempts(), 3);
    assert!(!loop_task.is_finished());
    assert_eq!(source.stops(), 0);

    source.stop();
    loop_task.await.unwrap();
}

#[tokio::test]
async fn negative_acknowledgments_are_counted_and_dropped() {
    let (producer, consumer) = relay_buffer::bounded(16);
    let source = Arc::new(TestSource::default());
    let sink = Arc::new(FailingSink::nack("delivery timeout"));

    let bridge = Bridge::new(
        consumer,
        source.clone(),
        sink.clone(),
        "twitter_tweets",
        POLL,
    );
    let stats = bridge.stats();
    let loop_task = tokio::spawn(bridge.run());

    for status in ["a", "b", "c"] {
        producer.enqueue(status.to_string()).await.unwrap();
    }

    // Failures surface through the detached acknowledgment tasks.
    wait_until(Duration::from_secs(2), || stats.publish_failures() == 3).await;
    assert_eq!(stats.published(), 0);
    assert!(!loop_task.is_finished());

    source.stop();
    loop_task.await.unwrap();
}

#[tokio::test]
async fn buffer_closure_stops_the_stream_client() {
    let (producer, consumer) = relay_buffer::bounded(16);
    let source = Arc::new(TestSource::default());
    let sink = Arc::new(CollectorSink::new());

    let bridge = Bridge::new(
        consumer,
        source.clone(),
        sink.clone(),
        "twitter_tweets",
        POLL,
    );
    let loop_task = tokio::spawn(bridge.run());

    producer.enqueue("residual".to_string()).await.unwrap();
    drop(producer);

    loop_task.await.unwrap();

    // The residue was still relayed before the closure surfaced.
    assert_eq!(sink.payloads(), vec!["residual"]);
    assert_eq!(source.stops(), 1);
    assert!(source.is_done());
}

#[tokio::test]
async fn shutdown_sequence_is_idempotent() {
    let source = Arc::new(TestSource::default());
    let sink = Arc::new(CollectorSink::new());
    let dyn_source: Arc<dyn StreamSource> = source.clone();
    let dyn_sink: Arc<dyn RecordSink> = sink.clone();

    shutdown(dyn_source.clone(), dyn_sink.clone()).await;
    assert!(source.is_done());
    assert!(sink.is_closed());

    // Second invocation must be harmless: stop flag stable, close a no-op.
    shutdown(dyn_source, dyn_sink).await;
    assert!(source.is_done());
    assert!(sink.is_closed());
    assert_eq!(source.stops(), 2);
    assert_eq!(sink.close_calls(), 2);
}

#[tokio::test]
async fn quiet_stream_exits_promptly_after_stop() {
    let (_producer, consumer) = relay_buffer::bounded::<String>(16);
    let source = Arc::new(TestSource::default());
    let sink = Arc::new(CollectorSink::new());

    let bridge = Bridge::new(
        consumer,
        source.clone(),
        sink.clone(),
        "twitter_tweets",
        POLL,
    );
    let loop_task = tokio::spawn(bridge.run());

    // Let the loop reach its timed poll, then stop with nothing buffered.
    tokio::time::sleep(Duration::from_millis(20)).await;
    source.stop();

    // Exit happens within one poll window, not a hang on an empty buffer.
    tokio::time::timeout(POLL * 4, loop_task)
        .await
        .expect("loop did not exit after stop")
        .unwrap();
    assert_eq!(sink.record_count(), 0);
}

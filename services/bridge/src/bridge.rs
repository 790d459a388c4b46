//! The relay loop: drain the buffer, publish each status, keep going until
//! the stream is over.
//!
//! Two states. RUNNING polls the buffer with a bounded wait so stream
//! liveness is re-checked a few times a minute even when nothing arrives.
//! A genuine buffer failure, not a mere timeout, switches to STOPPING by
//! stopping the stream client; the loop then falls out on its own liveness
//! check. Publish failures never change state: the status is logged,
//! counted, and dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use record_sink::{Record, RecordSink};
use relay_buffer::RelayConsumer;

use crate::input::firehose::StreamSource;

const DEFAULT_STATS_INTERVAL: u64 = 100;

/// Shared throughput counters for the relay loop.
#[derive(Debug, Default)]
pub struct BridgeStats {
    drained: AtomicU64,
    published: AtomicU64,
    publish_failures: AtomicU64,
}

impl BridgeStats {
    /// Statuses pulled out of the relay buffer.
    pub fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }

    /// Statuses positively acknowledged by the broker.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Statuses dropped because the publisher refused or the broker never
    /// acknowledged them.
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }
}

/// Drives statuses from the relay buffer into a [`RecordSink`].
pub struct Bridge {
    consumer: RelayConsumer<String>,
    source: Arc<dyn StreamSource>,
    sink: Arc<dyn RecordSink>,
    topic: String,
    poll_timeout: Duration,
    stats_interval: u64,
    stats: Arc<BridgeStats>,
}

impl Bridge {
    pub fn new(
        consumer: RelayConsumer<String>,
        source: Arc<dyn StreamSource>,
        sink: Arc<dyn RecordSink>,
        topic: impl Into<String>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            consumer,
            source,
            sink,
            topic: topic.into(),
            poll_timeout,
            stats_interval: DEFAULT_STATS_INTERVAL,
            stats: Arc::new(BridgeStats::default()),
        }
    }

    /// Log a throughput line every `every` acknowledged statuses.
    pub fn with_stats_interval(mut self, every: u64) -> Self {
        self.stats_interval = every.max(1);
        self
    }

    /// Counter handle that outlives `run`.
    pub fn stats(&self) -> Arc<BridgeStats> {
        self.stats.clone()
    }

    /// Run until the stream source reports done.
    pub async fn run(mut self) {
        info!(
            "🚀 Relay loop running: topic '{}', poll timeout {:?}",
            self.topic, self.poll_timeout
        );

        while !self.source.is_done() {
            match self.consumer.dequeue(self.poll_timeout).await {
                Ok(Some(line)) => self.publish(line),
                // Idle window elapsed; go around and re-check liveness.
                Ok(None) => continue,
                Err(e) => {
                    error!("❌ Relay buffer failed: {} - stopping stream client", e);
                    self.source.stop();
                }
            }
        }

        info!(
            "⏹️ End of stream: relay loop exiting ({} drained, {} published, {} failed)",
            self.stats.drained(),
            self.stats.published(),
            self.stats.publish_failures()
        );
    }

    /// Queue one status with the publisher and detach a task to log its
    /// acknowledgment. The loop never waits for the broker round trip.
    fn publish(&self, line: String) {
        let drained = self.stats.drained.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "📥 Drained status #{} ({} bytes, {} still buffered)",
            drained,
            line.len(),
            self.consumer.len()
        );

        let record = Record::to(&self.topic).payload(line);
        match self.sink.send(record) {
            Ok(ack) => {
                let stats = self.stats.clone();
                let topic = self.topic.clone();
                let interval = self.stats_interval;
                tokio::spawn(async move {
                    match ack.await {
                        Ok(delivery) => {
                            let published = stats.published.fetch_add(1, Ordering::Relaxed) + 1;
                            debug!(
                                "✅ Delivered to {}[{}]@{}",
                                topic, delivery.partition, delivery.offset
                            );
                            if published <= 5 || published % interval == 0 {
                                info!(
                                    "📊 {} statuses published ({} failures)",
                                    published,
                                    stats.publish_failures()
                                );
                            }
                        }
                        Err(e) => {
                            stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                            error!("❌ Delivery failed, dropping status: {}", e);
                        }
                    }
                });
            }
            Err(e) => {
                self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                error!("❌ Publisher rejected status, dropping: {}", e);
            }
        }
    }
}

/// Stop the stream client, then close the publisher. Safe to invoke from
/// the signal handler and again on the natural exit path; both halves are
/// idempotent and close errors are logged, not propagated.
pub async fn shutdown(source: Arc<dyn StreamSource>, sink: Arc<dyn RecordSink>) {
    info!("📡 Shutdown: stopping stream client");
    source.stop();

    if let Err(e) = sink.close().await {
        warn!("⚠️ Publisher close reported: {}", e);
    }
}

//! Kafka-backed [`RecordSink`] over the librdkafka future producer.
//!
//! `send` maps one-to-one onto the producer's own contract: queuing into
//! the client buffer is synchronous and order-preserving, the broker
//! acknowledgment comes back through a future. `close` flushes whatever is
//! still in flight within a bounded budget, once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::{debug, error, info, warn};

use record_sink::{Delivery, DeliveryFuture, Record, RecordSink, SinkError};

use crate::config::KafkaConfig;

/// Publisher for broker-bound status records.
pub struct KafkaPublisher {
    producer: FutureProducer,
    close_timeout: Duration,
    closed: AtomicBool,
}

impl KafkaPublisher {
    /// Build the producer from configuration. The client connects lazily,
    /// so this fails only on nonsensical settings, not an absent broker.
    pub fn new(config: &KafkaConfig) -> Result<Self, SinkError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("client.id", "firehose-bridge")
            .create()
            .map_err(|e| SinkError::invalid_config(e.to_string()))?;

        Ok(Self {
            producer,
            close_timeout: Duration::from_millis(config.close_timeout_ms),
            closed: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for KafkaPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaPublisher")
            .field("close_timeout", &self.close_timeout)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordSink for KafkaPublisher {
    fn send(&self, record: Record) -> Result<DeliveryFuture, SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }

        let Record {
            topic,
            key,
            payload,
        } = record;
        let mut outbound = FutureRecord::<String, String>::to(&topic).payload(&payload);
        if let Some(ref key) = key {
            outbound = outbound.key(key);
        }

        match self.producer.send_result(outbound) {
            Ok(acked) => Ok(Box::pin(async move {
                match acked.await {
                    Ok(Ok((partition, offset))) => Ok(Delivery { partition, offset }),
                    Ok(Err((err, _message))) => Err(SinkError::delivery(&topic, err.to_string())),
                    Err(_canceled) => Err(SinkError::delivery(
                        &topic,
                        "producer dropped before acknowledgment",
                    )),
                }
            })),
            Err((err, _record)) => Err(SinkError::rejected(&topic, err.to_string())),
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Publisher already closed");
            return Ok(());
        }

        let budget = self.close_timeout;
        info!("💧 Closing publisher: flushing with {:?} budget", budget);

        // flush blocks its thread, so it runs off the async workers.
        let producer = self.producer.clone();
        let flushed =
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(budget))).await;

        match flushed {
            Ok(Ok(())) => {
                info!("✅ Publisher closed");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("⚠️ Publisher flush incomplete: {}", e);
                Err(SinkError::Timeout(budget.as_millis() as u64))
            }
            Err(e) => {
                error!("Publisher flush task failed: {}", e);
                Err(SinkError::Timeout(budget.as_millis() as u64))
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

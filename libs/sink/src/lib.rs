//! # Record Sink - Publisher Seam
//!
//! A destination for string records that abstracts away the broker client,
//! so orchestration code can be driven by mocks in tests and by a real
//! producer in the binary.
//!
//! ## Send contract
//!
//! [`RecordSink::send`] is deliberately two-phase, mirroring how broker
//! clients actually behave:
//!
//! 1. the record is handed to the client **before `send` returns**, so the
//!    order of `send` calls is the order records enter the client
//! 2. the returned [`DeliveryFuture`] resolves later with the broker's
//!    acknowledgment (or the failure), so callers never stall a hot loop
//!    waiting for a round trip
//!
//! A caller that wants fire-and-forget spawns a task to await the future
//! and log the outcome; a caller that wants confirmation awaits it inline.

pub mod error;
pub mod record;
pub mod test_utils;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

pub use error::SinkError;
pub use record::{Delivery, Record};

/// Pending broker acknowledgment for one queued record.
pub type DeliveryFuture = Pin<Box<dyn Future<Output = Result<Delivery, SinkError>> + Send>>;

/// A destination for records.
#[async_trait]
pub trait RecordSink: Send + Sync + Debug {
    /// Queue `record` with the underlying client.
    ///
    /// Queuing is synchronous; an `Err` here means the record never entered
    /// the client. On `Ok`, the acknowledgment arrives through the returned
    /// future.
    fn send(&self, record: Record) -> Result<DeliveryFuture, SinkError>;

    /// Flush outstanding records per the client's own contract, then
    /// release the client. Idempotent: second and later calls are no-ops
    /// reporting success.
    async fn close(&self) -> Result<(), SinkError>;

    /// True once `close` has run.
    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CollectorSink, FailingSink};

    #[test]
    fn record_builder_defaults_to_absent_key() {
        let record = Record::to("events").payload("hello");
        assert_eq!(record.topic, "events");
        assert_eq!(record.payload, "hello");
        assert_eq!(record.key, None);
        assert_eq!(record.payload_size(), 5);

        let keyed = Record::to("events").payload("hello").key("user-1");
        assert_eq!(keyed.key.as_deref(), Some("user-1"));
    }

    #[test]
    fn collector_preserves_send_order_and_acks() {
        let sink = CollectorSink::new();

        for i in 0..3 {
            let ack = sink
                .send(Record::to("events").payload(format!("m{i}")))
                .unwrap();
            let delivery = tokio_test::block_on(ack).unwrap();
            assert_eq!(delivery.offset, i);
        }

        assert_eq!(sink.payloads(), vec!["m0", "m1", "m2"]);
        assert_eq!(sink.record_count(), 3);
    }

    #[test]
    fn collector_fail_next_send_rejects_once() {
        let sink = CollectorSink::new();
        sink.fail_next_send();

        let err = match sink.send(Record::to("events").payload("dropped")) {
            Err(err) => err,
            Ok(_) => panic!("the rejection toggle should have fired"),
        };
        assert!(matches!(err, SinkError::Rejected { .. }));
        assert!(err.is_recoverable());

        // The toggle is one-shot.
        sink.send(Record::to("events").payload("kept")).unwrap();
        assert_eq!(sink.payloads(), vec!["kept"]);
    }

    #[tokio::test]
    async fn collector_close_is_idempotent() {
        let sink = CollectorSink::new();
        assert!(!sink.is_closed());

        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert!(sink.is_closed());
        assert_eq!(sink.close_calls(), 2);

        let err = match sink.send(Record::to("events").payload("late")) {
            Err(err) => err,
            Ok(_) => panic!("a closed sink should refuse the send"),
        };
        assert!(matches!(err, SinkError::Closed));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn failing_sink_refuses_at_invocation() {
        let sink = FailingSink::refuse("broker unreachable");

        assert!(matches!(
            sink.send(Record::to("events").payload("m")),
            Err(SinkError::Rejected { .. })
        ));
        assert_eq!(sink.attempts(), 1);
    }

    #[test]
    fn failing_sink_nacks_after_queuing() {
        let sink = FailingSink::nack("delivery timeout");

        // Queuing succeeds, the acknowledgment carries the failure.
        let ack = sink.send(Record::to("events").payload("m")).unwrap();
        let err = tokio_test::block_on(ack).unwrap_err();
        assert!(matches!(err, SinkError::Delivery { .. }));
        assert_eq!(sink.attempts(), 1);
    }
}

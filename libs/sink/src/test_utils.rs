//! Mock sinks for exercising orchestration code without a broker.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Delivery, DeliveryFuture, Record, RecordSink, SinkError};

/// A sink that stores every record in arrival order and acknowledges each
/// with a monotonically increasing offset.
#[derive(Debug)]
pub struct CollectorSink {
    records: Mutex<Vec<Record>>,
    fail_next: AtomicBool,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    next_offset: AtomicI64,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            next_offset: AtomicI64::new(0),
        }
    }

    /// Snapshot of every record accepted so far, in send order.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    /// Payloads only, in send order.
    pub fn payloads(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.payload.clone())
            .collect()
    }

    /// Number of records accepted so far.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Reject the next `send` with a one-shot simulated failure.
    pub fn fail_next_send(&self) {
        self.fail_next.store(true, Ordering::Relaxed);
    }

    /// How many times `close` has been invoked, including no-op repeats.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Relaxed)
    }
}

impl Default for CollectorSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSink for CollectorSink {
    fn send(&self, record: Record) -> Result<DeliveryFuture, SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        if self.fail_next.swap(false, Ordering::Relaxed) {
            return Err(SinkError::rejected(&record.topic, "simulated rejection"));
        }

        self.records.lock().unwrap().push(record);
        let offset = self.next_offset.fetch_add(1, Ordering::Relaxed);
        Ok(Box::pin(async move {
            Ok(Delivery {
                partition: 0,
                offset,
            })
        }))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// How a [`FailingSink`] fails.
#[derive(Debug, Clone, Copy)]
enum FailureMode {
    /// `send` itself returns an error; nothing is queued.
    Refuse,
    /// `send` accepts the record, the acknowledgment resolves with an error.
    Nack,
}

/// A sink whose every send fails, for error-path tests.
#[derive(Debug)]
pub struct FailingSink {
    mode: FailureMode,
    reason: String,
    attempts: AtomicU64,
}

impl FailingSink {
    /// Fail synchronously at the `send` call.
    pub fn refuse(reason: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Refuse,
            reason: reason.into(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Accept every record, then fail its acknowledgment.
    pub fn nack(reason: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Nack,
            reason: reason.into(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Number of `send` calls observed.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl Default for FailingSink {
    fn default() -> Self {
        Self::refuse("simulated failure")
    }
}

#[async_trait]
impl RecordSink for FailingSink {
    fn send(&self, record: Record) -> Result<DeliveryFuture, SinkError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        match self.mode {
            FailureMode::Refuse => Err(SinkError::rejected(&record.topic, &self.reason)),
            FailureMode::Nack => {
                let err = SinkError::delivery(&record.topic, &self.reason);
                Ok(Box::pin(async move { Err(err) }))
            }
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

//! # Relay Buffer - Bounded FIFO Handoff
//!
//! Decouples a stream reader from a publish loop through a fixed-capacity
//! FIFO. The reader side suspends when the buffer is full, so backpressure
//! reaches the upstream connection instead of growing memory; the loop side
//! polls with a timeout so it can interleave liveness checks with draining.
//!
//! ## Semantics
//!
//! - `enqueue` appends at the tail and waits while the buffer is at capacity
//! - `dequeue` removes from the head, waiting at most the given timeout;
//!   an empty result after the timeout is `Ok(None)`, not an error
//! - once every producer handle is gone and the residue is drained, the
//!   consumer sees [`BufferError::Closed`] - the signal that no more items
//!   can ever arrive
//!
//! Built on `tokio::sync::mpsc` rather than a hand-rolled ring: the channel
//! already provides the capacity bound, FIFO ordering, and waker plumbing.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Failure modes of the relay buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Every handle on the opposite side has been dropped. For a consumer
    /// this means the buffer is drained and permanently empty.
    #[error("buffer closed: opposite side dropped all handles")]
    Closed,
}

/// Non-blocking enqueue failure. The rejected item is handed back so the
/// caller can decide what to do with it.
#[derive(Debug, Error)]
pub enum TryEnqueueError<T> {
    /// Buffer is at capacity.
    #[error("buffer full")]
    Full(T),
    /// Consumer is gone.
    #[error("buffer closed")]
    Closed(T),
}

impl<T> TryEnqueueError<T> {
    /// Recover the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            TryEnqueueError::Full(item) | TryEnqueueError::Closed(item) => item,
        }
    }
}

/// Create a buffer holding at most `capacity` items.
///
/// Panics if `capacity` is zero, mirroring the underlying channel.
pub fn bounded<T>(capacity: usize) -> (RelayProducer<T>, RelayConsumer<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (RelayProducer { tx }, RelayConsumer { rx })
}

/// Insertion side. Cheap to clone; every clone feeds the same buffer.
#[derive(Debug)]
pub struct RelayProducer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for RelayProducer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> RelayProducer<T> {
    /// Append `item` at the tail, suspending while the buffer is full.
    ///
    /// Returns [`BufferError::Closed`] once the consumer has been dropped;
    /// the item is lost in that case, as there is nowhere left to hand it.
    pub async fn enqueue(&self, item: T) -> Result<(), BufferError> {
        self.tx.send(item).await.map_err(|_| BufferError::Closed)
    }

    /// Append `item` only if a slot is free right now.
    pub fn try_enqueue(&self, item: T) -> Result<(), TryEnqueueError<T>> {
        self.tx.try_send(item).map_err(|err| match err {
            TrySendError::Full(item) => TryEnqueueError::Full(item),
            TrySendError::Closed(item) => TryEnqueueError::Closed(item),
        })
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the next `enqueue` would suspend.
    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    /// Configured capacity bound.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// True once the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drain side. Not cloneable; exactly one consumer owns the head.
#[derive(Debug)]
pub struct RelayConsumer<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> RelayConsumer<T> {
    /// Remove the head item, waiting at most `wait` for one to arrive.
    ///
    /// - `Ok(Some(item))` - an item was available within the window
    /// - `Ok(None)` - the timeout elapsed with the buffer empty; the caller
    ///   is expected to re-check its exit condition and poll again
    /// - `Err(Closed)` - all producers are gone and the buffer is drained
    pub async fn dequeue(&mut self, wait: Duration) -> Result<Option<T>, BufferError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(item)) => Ok(Some(item)),
            Ok(None) => Err(BufferError::Closed),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn preserves_fifo_order() {
        let (producer, mut consumer) = bounded(16);

        for i in 0..10 {
            producer.enqueue(format!("msg-{i}")).await.unwrap();
        }

        for i in 0..10 {
            let item = consumer.dequeue(SHORT).await.unwrap();
            assert_eq!(item, Some(format!("msg-{i}")));
        }
    }

    #[tokio::test]
    async fn never_exceeds_capacity() {
        let (producer, mut consumer) = bounded(2);

        producer.enqueue("a").await.unwrap();
        producer.enqueue("b").await.unwrap();
        assert_eq!(producer.len(), 2);
        assert!(producer.is_full());

        // Third item must be rejected while both slots are taken.
        match producer.try_enqueue("c") {
            Err(TryEnqueueError::Full(item)) => assert_eq!(item, "c"),
            other => panic!("expected Full rejection, got {other:?}"),
        }

        // A blocking enqueue suspends rather than overfilling.
        let blocked = tokio::time::timeout(SHORT, producer.enqueue("c")).await;
        assert!(blocked.is_err(), "enqueue should suspend at capacity");
        assert_eq!(producer.len(), 2);

        // Draining one slot unblocks insertion.
        assert_eq!(consumer.dequeue(SHORT).await.unwrap(), Some("a"));
        producer.enqueue("c").await.unwrap();
        assert_eq!(consumer.dequeue(SHORT).await.unwrap(), Some("b"));
        assert_eq!(consumer.dequeue(SHORT).await.unwrap(), Some("c"));
    }

    #[tokio::test]
    async fn blocked_enqueue_completes_after_drain() {
        let (producer, mut consumer) = bounded(1);
        producer.enqueue(1u32).await.unwrap();

        // A second enqueue parks until the consumer frees the slot.
        let mut blocked = tokio_test::task::spawn(producer.enqueue(2u32));
        tokio_test::assert_pending!(blocked.poll());

        assert_eq!(consumer.dequeue(SHORT).await.unwrap(), Some(1));
        assert!(blocked.is_woken());
        tokio_test::assert_ready_ok!(blocked.poll());
        drop(blocked);

        assert_eq!(consumer.dequeue(SHORT).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn empty_dequeue_waits_full_timeout() {
        let (_producer, mut consumer) = bounded::<String>(4);

        let started = Instant::now();
        let result = consumer.dequeue(SHORT).await;
        let elapsed = started.elapsed();

        assert_eq!(result, Ok(None));
        assert!(
            elapsed >= SHORT,
            "returned after {elapsed:?}, before the {SHORT:?} window closed"
        );
    }

    #[tokio::test]
    async fn drains_residue_then_reports_closed() {
        let (producer, mut consumer) = bounded(4);
        producer.enqueue("left-behind").await.unwrap();
        drop(producer);

        assert_eq!(
            consumer.dequeue(SHORT).await.unwrap(),
            Some("left-behind")
        );
        assert_eq!(consumer.dequeue(SHORT).await, Err(BufferError::Closed));
        // The condition is terminal.
        assert_eq!(consumer.dequeue(SHORT).await, Err(BufferError::Closed));
    }

    #[tokio::test]
    async fn enqueue_fails_once_consumer_gone() {
        let (producer, consumer) = bounded(4);
        drop(consumer);

        assert!(producer.is_closed());
        assert_eq!(producer.enqueue("x").await, Err(BufferError::Closed));
        match producer.try_enqueue("y") {
            Err(err @ TryEnqueueError::Closed(_)) => assert_eq!(err.into_inner(), "y"),
            other => panic!("expected Closed rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clones_feed_the_same_buffer() {
        let (producer, mut consumer) = bounded(8);
        let second = producer.clone();

        producer.enqueue("from-first").await.unwrap();
        second.enqueue("from-second").await.unwrap();

        assert_eq!(consumer.len(), 2);
        assert_eq!(
            consumer.dequeue(SHORT).await.unwrap(),
            Some("from-first")
        );
        assert_eq!(
            consumer.dequeue(SHORT).await.unwrap(),
            Some("from-second")
        );
    }
}

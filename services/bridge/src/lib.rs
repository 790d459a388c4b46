//! # Firehose Bridge - Stream to Broker Relay
//!
//! Subscribes to a filtered real-time status stream and republishes every
//! received status line onto a Kafka topic.
//!
//! ## Architecture
//!
//! ```text
//! Filtered Stream (HTTPS, OAuth1) → FirehoseClient → RelayBuffer(1000)
//!                                                         │ dequeue(5s)
//!                                                         ▼
//!                               KafkaPublisher  ←  Bridge relay loop
//!                               (twitter_tweets topic, keyless records)
//! ```
//!
//! The pieces are deliberately decoupled:
//!
//! - [`FirehoseClient`] owns the connection, line framing, and reconnect
//!   policy; it pushes raw status lines into the bounded relay buffer and
//!   suspends when the buffer is full
//! - [`Bridge`] drains the buffer with a timed poll and hands each status
//!   to a [`record_sink::RecordSink`], never waiting on broker round trips
//! - [`KafkaPublisher`] is the production sink; tests drive the loop with
//!   the mock sinks from `record_sink::test_utils`
//!
//! Shutdown is a single idempotent sequence ([`shutdown`]): stop the
//! stream client, then flush and close the publisher. It runs on Ctrl+C
//! and again on the natural exit path; repeat invocations are no-ops.

pub mod bridge;
pub mod config;
pub mod error;
pub mod input;
pub mod output;

pub use bridge::{shutdown, Bridge, BridgeStats};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use input::{FirehoseClient, StreamSource};
pub use output::KafkaPublisher;

//! Stream-side adapters: the firehose client and its request signing.

pub mod firehose;
pub mod oauth;

pub use firehose::{FirehoseClient, StreamSource};

//! Publisher-side adapters.

pub mod kafka;

pub use kafka::KafkaPublisher;

/// A broker-bound record: destination topic, optional partitioning key,
/// string payload.
///
/// Built in the same chained style as the broker client's own record type,
/// starting from the topic:
///
/// ```
/// use record_sink::Record;
///
/// let record = Record::to("twitter_tweets").payload("{\"text\":\"hi\"}");
/// assert!(record.key.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Destination topic.
    pub topic: String,
    /// Partitioning key. Absent unless explicitly set; records without a
    /// key are spread round-robin by the broker client.
    pub key: Option<String>,
    /// Message body, published as UTF-8 bytes.
    pub payload: String,
}

impl Record {
    /// Start a record destined for `topic`, with no key and an empty payload.
    pub fn to(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload: String::new(),
        }
    }

    /// Set the payload.
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set the partitioning key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

/// Broker acknowledgment for a delivered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Partition the record landed on.
    pub partition: i32,
    /// Offset assigned within that partition.
    pub offset: i64,
}

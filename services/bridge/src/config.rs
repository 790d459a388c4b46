//! TOML configuration with environment overrides.
//!
//! Layout mirrors the service split: `[stream]` for the firehose side
//! (endpoint, tracked terms, timeouts, reconnect policy, credentials),
//! `[kafka]` for the publisher, `[bridge]` for the relay loop itself.
//! Credentials can be left out of the file and supplied through
//! `TWITTER_*` environment variables instead.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub stream: StreamConfig,
    pub kafka: KafkaConfig,
    pub bridge: BridgeSection,
}

/// Firehose subscription settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Filtered-stream endpoint
    pub endpoint: String,
    /// Terms the filtered stream should match
    pub track: Vec<String>,
    pub connect_timeout_ms: u64,
    /// A connection with no bytes for this long is presumed dead
    pub read_timeout_ms: u64,
    /// Longest accepted status line; anything larger is dropped whole
    pub max_line_bytes: usize,
    pub max_reconnect_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub auth: OauthCredentials,
}

/// OAuth1 credentials for the stream endpoint. Treated as opaque strings.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OauthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

// Secrets stay out of logs even at debug level.
impl fmt::Debug for OauthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(value: &str) -> &'static str {
            if value.is_empty() {
                "<unset>"
            } else {
                "***"
            }
        }
        f.debug_struct("OauthCredentials")
            .field("consumer_key", &mask(&self.consumer_key))
            .field("consumer_secret", &mask(&self.consumer_secret))
            .field("access_token", &mask(&self.access_token))
            .field("access_token_secret", &mask(&self.access_token_secret))
            .finish()
    }
}

/// Broker publisher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    /// Topic every status is published to
    pub topic: String,
    /// Per-record delivery deadline inside the broker client
    pub message_timeout_ms: u64,
    /// Flush budget when the publisher is closed
    pub close_timeout_ms: u64,
}

/// Relay loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Slots in the relay buffer between reader and publish loop
    pub buffer_capacity: usize,
    /// How long one dequeue waits before re-checking stream liveness
    pub poll_timeout_secs: u64,
    /// Log a throughput line every Nth published status
    pub stats_interval: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://stream.twitter.com/1.1/statuses/filter.json".to_string(),
            track: vec!["kafka".to_string()],
            connect_timeout_ms: 30000,
            read_timeout_ms: 90000,
            max_line_bytes: 1048576,
            max_reconnect_attempts: 10,
            base_backoff_ms: 1000,
            max_backoff_ms: 60000,
            auth: OauthCredentials::default(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "127.0.0.1:9092".to_string(),
            topic: "twitter_tweets".to_string(),
            message_timeout_ms: 30000,
            close_timeout_ms: 10000,
        }
    }
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            poll_timeout_secs: 5,
            stats_interval: 100,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_with_env_overrides(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: BridgeConfig =
            toml::from_str(&config_str).context("Failed to parse TOML configuration")?;

        config.apply_env_overrides();

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("TWITTER_CONSUMER_KEY") {
            self.stream.auth.consumer_key = key;
        }

        if let Ok(secret) = std::env::var("TWITTER_CONSUMER_SECRET") {
            self.stream.auth.consumer_secret = secret;
        }

        if let Ok(token) = std::env::var("TWITTER_ACCESS_TOKEN") {
            self.stream.auth.access_token = token;
        }

        if let Ok(secret) = std::env::var("TWITTER_ACCESS_TOKEN_SECRET") {
            self.stream.auth.access_token_secret = secret;
        }

        if let Ok(terms) = std::env::var("TWITTER_TRACK_TERMS") {
            self.stream.track = terms.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(servers) = std::env::var("KAFKA_BOOTSTRAP_SERVERS") {
            self.kafka.bootstrap_servers = servers;
        }

        if let Ok(topic) = std::env::var("KAFKA_TOPIC") {
            self.kafka.topic = topic;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.stream.endpoint.starts_with("https://")
            && !self.stream.endpoint.starts_with("http://")
        {
            return Err(anyhow::anyhow!("Invalid stream endpoint scheme"));
        }

        if self.stream.track.is_empty() || self.stream.track.iter().any(|t| t.trim().is_empty()) {
            return Err(anyhow::anyhow!("No track terms configured"));
        }

        let auth = &self.stream.auth;
        if auth.consumer_key.is_empty()
            || auth.consumer_secret.is_empty()
            || auth.access_token.is_empty()
            || auth.access_token_secret.is_empty()
        {
            return Err(anyhow::anyhow!(
                "Incomplete OAuth credentials (set them in the config file or TWITTER_* env vars)"
            ));
        }

        if self.stream.max_reconnect_attempts == 0 {
            return Err(anyhow::anyhow!("max_reconnect_attempts must be at least 1"));
        }

        if self.stream.base_backoff_ms == 0
            || self.stream.base_backoff_ms > self.stream.max_backoff_ms
        {
            return Err(anyhow::anyhow!("Invalid backoff range"));
        }

        if self.stream.max_line_bytes == 0 {
            return Err(anyhow::anyhow!("max_line_bytes must be at least 1"));
        }

        if self.kafka.bootstrap_servers.is_empty() {
            return Err(anyhow::anyhow!("No bootstrap servers configured"));
        }

        if self.kafka.topic.is_empty() {
            return Err(anyhow::anyhow!("No topic configured"));
        }

        if self.bridge.buffer_capacity == 0 {
            return Err(anyhow::anyhow!("buffer_capacity must be at least 1"));
        }

        if self.bridge.poll_timeout_secs == 0 {
            return Err(anyhow::anyhow!("poll_timeout_secs must be at least 1"));
        }

        if self.bridge.stats_interval == 0 {
            return Err(anyhow::anyhow!("stats_interval must be at least 1"));
        }

        Ok(())
    }
}

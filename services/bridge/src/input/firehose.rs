//! Filtered-stream client: long-lived HTTPS connection, line framing,
//! reconnect policy, and the liveness/stop seam the relay loop drives.
//!
//! The stream protocol is newline-delimited JSON over a chunked response
//! body. Blank lines are keep-alive signals and never reach the buffer.
//! Each complete status line is enqueued as-is; a full buffer suspends the
//! reader, which in turn stops draining the socket (backpressure instead
//! of unbounded memory).

use std::cmp;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use relay_buffer::RelayProducer;

use crate::config::StreamConfig;
use crate::error::{BridgeError, Result};
use crate::input::oauth;

/// Liveness and stop seam between the stream side and the relay loop.
///
/// The loop only ever asks two things of the stream: "are you finished?"
/// and "stop". Keeping this a trait lets tests drive the loop with a
/// hand-rolled source instead of a live connection.
pub trait StreamSource: Send + Sync {
    /// True once the stream is over: stopped by request, or its reader gave
    /// up for good. New messages can never arrive after this reports true.
    fn is_done(&self) -> bool;

    /// Request termination. Idempotent; `is_done` reports true immediately,
    /// the reader unwinds at its next await point.
    fn stop(&self);
}

/// Assembles complete lines from arbitrarily-split body chunks.
///
/// Lines end with `\n`; a trailing `\r` is stripped so CRLF framing works
/// too. Empty lines (keep-alives) are swallowed. A line that outgrows
/// `max_line_bytes` is dropped whole and assembly resumes after its
/// terminator, so a peer that never sends a newline cannot grow the
/// partial without bound.
pub(crate) struct LineBuffer {
    partial: Vec<u8>,
    max_line_bytes: usize,
    discarding: bool,
}

impl LineBuffer {
    pub(crate) fn new(max_line_bytes: usize) -> Self {
        Self {
            partial: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Feed one chunk, get back every line it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if !self.discarding {
                    if self.partial.last() == Some(&b'\r') {
                        self.partial.pop();
                    }
                    if !self.partial.is_empty() {
                        lines.push(String::from_utf8_lossy(&self.partial).into_owned());
                    }
                }
                self.partial.clear();
                self.discarding = false;
            } else if !self.discarding {
                self.partial.push(byte);
                if self.partial.len() > self.max_line_bytes {
                    warn!("⚠️ Dropping status line over {} bytes", self.max_line_bytes);
                    self.partial.clear();
                    self.discarding = true;
                }
            }
        }
        lines
    }
}

struct Inner {
    config: StreamConfig,
    done: AtomicBool,
    cancel: CancellationToken,
    lines_received: AtomicU64,
    reconnects: AtomicU32,
}

/// Handle to the firehose connection. Cheap to clone; all clones share the
/// reader task, the counters, and the stop flag.
#[derive(Clone)]
pub struct FirehoseClient {
    inner: Arc<Inner>,
}

impl FirehoseClient {
    /// Open the stream and spawn the reader task.
    ///
    /// The first connection happens inline: a rejected subscription or an
    /// unreachable endpoint fails startup instead of silently retrying in
    /// the background. Reconnects after that point are the reader's job.
    pub async fn connect(config: StreamConfig, producer: RelayProducer<String>) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;

        let first = open_stream(&client, &endpoint, &config).await?;
        info!(
            "✅ Firehose connected: {} tracking {:?}",
            endpoint.host_str().unwrap_or("?"),
            config.track
        );

        let inner = Arc::new(Inner {
            config,
            done: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            lines_received: AtomicU64::new(0),
            reconnects: AtomicU32::new(0),
        });

        let task_inner = inner.clone();
        tokio::spawn(async move {
            match pump(&task_inner, &client, &endpoint, &producer, first).await {
                Ok(()) => info!("⏹️ Firehose reader stopped"),
                Err(e) => error!("🔥 Firehose reader gave up: {}", e),
            }
            // Either way the stream is over; the relay loop sees it on its
            // next liveness check.
            task_inner.done.store(true, Ordering::SeqCst);
        });

        Ok(Self { inner })
    }

    /// Status lines relayed into the buffer so far.
    pub fn received(&self) -> u64 {
        self.inner.lines_received.load(Ordering::Relaxed)
    }

    /// Successful reconnections performed by the reader.
    pub fn reconnects(&self) -> u32 {
        self.inner.reconnects.load(Ordering::Relaxed)
    }
}

impl StreamSource for FirehoseClient {
    fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!("⏹️ Stopping firehose client");
            self.inner.cancel.cancel();
        }
        self.inner.done.store(true, Ordering::SeqCst);
    }
}

/// Send the signed subscription request and check the response status.
async fn open_stream(
    client: &reqwest::Client,
    endpoint: &Url,
    config: &StreamConfig,
) -> Result<reqwest::Response> {
    let params = vec![("track".to_string(), config.track.join(","))];
    let authorization = oauth::authorization_header(
        "POST",
        endpoint,
        &params,
        &config.auth,
        &oauth::generate_nonce(),
        oauth::unix_timestamp(),
    );
    // Body encoding must match what was signed, so it is built with the
    // same strict escaping instead of a generic form serializer.
    let body = params
        .iter()
        .map(|(k, v)| format!("{}={}", oauth::percent_encode(k), oauth::percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let response = tokio::time::timeout(
        Duration::from_millis(config.connect_timeout_ms),
        client
            .post(endpoint.clone())
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send(),
    )
    .await
    .map_err(|_| BridgeError::ConnectionTimeout {
        timeout_ms: config.connect_timeout_ms,
    })??;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(BridgeError::AuthenticationRejected {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(BridgeError::StreamRejected {
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Read cycles with reconnect-and-backoff until stopped or out of attempts.
async fn pump(
    inner: &Inner,
    client: &reqwest::Client,
    endpoint: &Url,
    producer: &RelayProducer<String>,
    first: reqwest::Response,
) -> Result<()> {
    let config = &inner.config;
    let mut current = Some(first);
    let mut attempts: u32 = 0;

    loop {
        if inner.cancel.is_cancelled() {
            return Ok(());
        }

        let response = match current.take() {
            Some(response) => response,
            None => {
                attempts += 1;
                if attempts > config.max_reconnect_attempts {
                    return Err(BridgeError::ReconnectAttemptsExhausted {
                        max_attempts: config.max_reconnect_attempts,
                    });
                }

                let backoff = backoff_delay(config, attempts);
                warn!(
                    "⏳ Reconnecting in {:?} (attempt {} of {})",
                    backoff, attempts, config.max_reconnect_attempts
                );
                tokio::select! {
                    _ = inner.cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(backoff) => {}
                }

                match open_stream(client, endpoint, config).await {
                    Ok(response) => {
                        inner.reconnects.fetch_add(1, Ordering::Relaxed);
                        info!("🔌 Firehose reconnected");
                        response
                    }
                    Err(e) if e.is_permanent() => return Err(e),
                    Err(e) => {
                        warn!("❌ Reconnect attempt {} failed: {}", attempts, e);
                        continue;
                    }
                }
            }
        };

        let before = inner.lines_received.load(Ordering::Relaxed);
        match consume_stream(inner, response, producer).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_recoverable() => {
                warn!("❌ Stream connection lost: {}", e);
                // A connection that actually delivered data earns a fresh
                // set of reconnect attempts.
                if inner.lines_received.load(Ordering::Relaxed) > before {
                    attempts = 0;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Drain one connection until it dies, stalls, or the client is stopped.
/// `Ok(())` means stopped; every connection failure is an `Err` so the
/// caller can decide between reconnect and give-up.
async fn consume_stream(
    inner: &Inner,
    response: reqwest::Response,
    producer: &RelayProducer<String>,
) -> Result<()> {
    let read_timeout = Duration::from_millis(inner.config.read_timeout_ms);
    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::new(inner.config.max_line_bytes);

    loop {
        let chunk = tokio::select! {
            _ = inner.cancel.cancelled() => return Ok(()),
            read = tokio::time::timeout(read_timeout, body.next()) => read,
        };

        match chunk {
            Ok(Some(Ok(bytes))) => {
                for line in lines.push(&bytes) {
                    let total = inner.lines_received.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("📥 Status line #{} received ({} bytes)", total, line.len());
                    tokio::select! {
                        _ = inner.cancel.cancelled() => return Ok(()),
                        enqueued = producer.enqueue(line) => enqueued?,
                    }
                }
            }
            Ok(Some(Err(e))) => return Err(BridgeError::Http(e)),
            Ok(None) => return Err(BridgeError::StreamEnded),
            Err(_elapsed) => {
                return Err(BridgeError::ReadStalled {
                    timeout_ms: inner.config.read_timeout_ms,
                })
            }
        }
    }
}

/// Exponential backoff, doubling from the base and capped at the maximum.
fn backoff_delay(config: &StreamConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay_ms = cmp::min(
        config.base_backoff_ms.saturating_mul(1u64 << exponent),
        config.max_backoff_ms,
    );
    Duration::from_millis(delay_ms)
}

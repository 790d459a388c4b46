//! Firehose bridge service binary.
//!
//! Wires the pieces together in dependency order: configuration, relay
//! buffer, stream client (whose first connection must succeed), publisher,
//! then the relay loop. A Ctrl+C handler and the natural exit path share
//! one idempotent shutdown sequence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use record_sink::RecordSink;
use tracing::info;
use tracing_subscriber::EnvFilter;

use firehose_bridge::{shutdown, Bridge, BridgeConfig, FirehoseClient, KafkaPublisher, StreamSource};

#[derive(Parser, Debug)]
#[command(name = "firehose_bridge")]
#[command(about = "Relays a filtered status stream onto a Kafka topic")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "bridge.toml")]
    config: PathBuf,

    /// Enable debug logging for the bridge
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("info,firehose_bridge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Starting firehose bridge");

    let config = BridgeConfig::from_toml_with_env_overrides(&args.config)
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("📋 Configuration:");
    info!(
        "   Stream: {} tracking {:?}",
        config.stream.endpoint, config.stream.track
    );
    info!(
        "   Kafka: {} → topic '{}'",
        config.kafka.bootstrap_servers, config.kafka.topic
    );
    info!(
        "   Buffer: {} slots, {}s poll timeout",
        config.bridge.buffer_capacity, config.bridge.poll_timeout_secs
    );

    let (producer, consumer) = relay_buffer::bounded(config.bridge.buffer_capacity);

    let client = FirehoseClient::connect(config.stream.clone(), producer)
        .await
        .context("Failed to open firehose stream")?;
    let publisher = KafkaPublisher::new(&config.kafka).context("Failed to create publisher")?;

    let source: Arc<dyn StreamSource> = Arc::new(client.clone());
    let sink: Arc<dyn RecordSink> = Arc::new(publisher);

    {
        let source = source.clone();
        let sink = sink.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("📡 Received Ctrl+C, shutting down...");
                shutdown(source, sink).await;
            }
        });
    }

    let bridge = Bridge::new(
        consumer,
        source.clone(),
        sink.clone(),
        &config.kafka.topic,
        Duration::from_secs(config.bridge.poll_timeout_secs),
    )
    .with_stats_interval(config.bridge.stats_interval);
    let stats = bridge.stats();

    bridge.run().await;

    // Harmless repeat if the signal handler already ran it.
    shutdown(source, sink).await;

    info!(
        "📊 Final stats: {} received, {} drained, {} published, {} publish failures, {} reconnects",
        client.received(),
        stats.drained(),
        stats.published(),
        stats.publish_failures(),
        client.reconnects()
    );
    info!("✅ End of application");

    Ok(())
}

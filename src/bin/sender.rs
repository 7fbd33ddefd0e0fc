//! VBAN Sender Application
//!
//! Captures an input device and streams it as VBAN over UDP.
//!
//! Usage: `vban-sender [ip:port]`. Without an argument the destination from
//! the config file is used.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::net::SocketAddrV4;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vban_streamer::{
    config::AppConfig,
    constants::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE},
    network::Destination,
    StreamBridge,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting VBAN Sender");

    let config_path = AppConfig::default_path()?;
    let mut config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some(arg) = std::env::args().nth(1) {
        let addr: SocketAddrV4 = arg
            .parse()
            .with_context(|| format!("invalid destination address {arg:?}"))?;
        config.destination = Destination::from(addr);
    }

    match config.destination.socket_addr() {
        Some(addr) => tracing::info!("Destination: {}", addr),
        None => tracing::warn!("No destination configured; frames will be dropped"),
    }

    // Pick the input device
    let host = cpal::default_host();
    let device = match &config.capture.device {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| anyhow!("input device {name:?} not found"))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("no default input device"))?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let stream_config: cpal::StreamConfig = match device.default_input_config() {
        Ok(supported) => supported.config(),
        Err(e) => {
            tracing::warn!("No default input config ({}), using defaults", e);
            cpal::StreamConfig {
                channels: DEFAULT_CHANNELS,
                sample_rate: cpal::SampleRate(DEFAULT_SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            }
        }
    };
    let channels = stream_config.channels;
    let sample_rate = stream_config.sample_rate.0;

    tracing::info!(
        "Capturing from {}: {}Hz, {} channels",
        device_name,
        sample_rate,
        channels
    );

    let mut bridge = StreamBridge::new(config);
    bridge.setup(sample_rate as f64, channels as u32)?;

    let producer = bridge.producer();
    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            producer.process_interleaved(data, channels);
        },
        |err| tracing::error!("Input stream error: {}", err),
        None,
    )?;
    stream.play()?;

    tracing::info!("Streaming - press Ctrl+C to stop");

    let mut stats_tick = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = stats_tick.tick() => {
                if let Some(e) = bridge.check_errors() {
                    tracing::error!("Stream failed: {}", e);
                    break;
                }
                let stats = bridge.stats();
                tracing::info!(
                    "Stats: {} packets sent, {:.1} KB sent, {} send errors, {} skipped",
                    stats.frames_sent,
                    stats.bytes_sent as f64 / 1024.0,
                    stats.send_errors,
                    stats.frames_skipped
                );
            }
        }
    }

    tracing::info!("Shutting down");
    drop(stream);
    bridge.stop();
    Ok(())
}

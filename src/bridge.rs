//! Owner-side facade used by the audio host
//!
//! [`StreamBridge`] is what a host integration holds: it receives setup calls,
//! per-callback audio, destination changes and state persistence, and keeps
//! exactly one [`StreamingWorker`] alive behind them.

use bytes::Bytes;
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

use crate::audio::buffer::{create_shared_queue, SharedHandoffQueue};
use crate::audio::packet::FramePacket;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::network::{Destination, SharedDestination};
use crate::state::PersistedState;
use crate::stream::StreamSettings;
use crate::worker::{StreamingWorker, WorkerState, WorkerStatsSnapshot};

/// Real-time side handle. Cheap to clone and safe to move into a callback.
///
/// Every method copies the block and enqueues it without blocking.
#[derive(Clone)]
pub struct StreamProducer {
    queue: SharedHandoffQueue,
}

impl StreamProducer {
    /// Push one block given as per-channel slices
    pub fn process<S: AsRef<[f32]>>(&self, channels: &[S]) {
        self.queue.push(FramePacket::from_channels(channels));
    }

    /// Push one interleaved block
    pub fn process_interleaved(&self, data: &[f32], channels: u16) {
        self.queue.push(FramePacket::from_interleaved(data, channels));
    }
}

pub struct StreamBridge {
    config: AppConfig,
    queue: SharedHandoffQueue,
    destination: SharedDestination,
    worker: StreamingWorker,
    settings: Option<StreamSettings>,
}

impl StreamBridge {
    pub fn new(config: AppConfig) -> Self {
        let queue = create_shared_queue();
        let destination = Arc::new(Mutex::new(config.destination));
        Self {
            worker: StreamingWorker::new(queue.clone()),
            config,
            queue,
            destination,
            settings: None,
        }
    }

    /// (Re)start streaming for the host's sample rate and channel count.
    ///
    /// Any running worker is stopped first. On a configuration error the
    /// stream stays stopped.
    pub fn setup(&mut self, sample_rate: f64, channels: u32) -> Result<()> {
        let settings = StreamSettings::resolve(sample_rate, channels, &self.config.stream);
        info!(
            sample_rate,
            channels,
            frames_per_packet = settings.frames_per_packet,
            "Setting up stream"
        );

        let result = self
            .worker
            .start(&settings, self.config.pacing.clone(), self.destination.clone());
        self.settings = result.is_ok().then_some(settings);
        result
    }

    /// Stop streaming and discard queued audio
    pub fn stop(&mut self) {
        self.worker.stop();
        self.settings = None;
    }

    /// Handle for the real-time callback
    pub fn producer(&self) -> StreamProducer {
        StreamProducer {
            queue: self.queue.clone(),
        }
    }

    /// See [`StreamProducer::process`]
    pub fn process<S: AsRef<[f32]>>(&self, channels: &[S]) {
        self.producer().process(channels);
    }

    /// See [`StreamProducer::process_interleaved`]
    pub fn process_interleaved(&self, data: &[f32], channels: u16) {
        self.producer().process_interleaved(data, channels);
    }

    pub fn destination(&self) -> Destination {
        *self.destination.lock()
    }

    /// Takes effect on the next datagram
    pub fn set_destination(&self, destination: Destination) {
        *self.destination.lock() = destination;
    }

    pub fn set_destination_address(&self, address: Ipv4Addr) {
        self.destination.lock().address = address;
    }

    pub fn set_destination_port(&self, port: u16) {
        self.destination.lock().port = port;
    }

    /// Serialize the persisted state blob
    pub fn save_state(&self) -> Bytes {
        PersistedState {
            destination: self.destination(),
        }
        .encode()
    }

    /// Apply a persisted state blob. Nothing changes if it is rejected.
    pub fn load_state(&self, blob: &[u8]) -> Result<()> {
        let state = PersistedState::decode(blob)?;
        self.set_destination(state.destination);
        Ok(())
    }

    /// Settings of the running stream, if one was set up
    pub fn settings(&self) -> Option<&StreamSettings> {
        self.settings.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn has_failed(&self) -> bool {
        self.worker.has_failed()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.worker.stats()
    }

    /// Next fatal stream error, if the worker reported one
    pub fn check_errors(&self) -> Option<Error> {
        self.worker.check_errors()
    }

    /// Packets waiting for the worker
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

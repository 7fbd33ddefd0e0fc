//! Background streaming worker
//!
//! Owns the only thread that blocks or touches the network. Each session opens
//! a socket, then loops: wait on the handoff queue (as long as pacing allows),
//! reinterleave whatever arrived, and attempt exactly one datagram.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use socket2::Socket;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::audio::buffer::SharedHandoffQueue;
use crate::audio::packet::FramePacket;
use crate::error::{Error, NetworkError, Result, StreamError};
use crate::network::{send_datagram, udp, Destination, SendOutcome, SharedDestination};
use crate::pacing::PacingConfig;
use crate::protocol::VbanHeader;
use crate::stream::{StreamSettings, StreamState};

/// Lifecycle of the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
    /// A fatal error ended the stream; stays here until the next start
    Failed,
}

/// Counters updated by the worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_errors: AtomicU64,
    frames_skipped: AtomicU64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.frames_sent.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.send_errors.store(0, Ordering::Relaxed);
        self.frames_skipped.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    /// Datagrams handed to the socket successfully
    pub frames_sent: u64,
    pub bytes_sent: u64,
    /// Datagrams dropped because the send failed or was short
    pub send_errors: u64,
    /// Datagrams produced while no destination address was configured
    pub frames_skipped: u64,
}

pub struct StreamingWorker {
    queue: SharedHandoffQueue,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    stats: Arc<WorkerStats>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<Error>>,
}

impl StreamingWorker {
    pub fn new(queue: SharedHandoffQueue) -> Self {
        Self {
            queue,
            running: Arc::new(AtomicBool::new(false)),
            failed: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(WorkerState::Stopped)),
            stats: Arc::new(WorkerStats::default()),
            thread_handle: None,
            error_rx: None,
        }
    }

    /// Start streaming with `settings`, stopping any running worker first.
    ///
    /// Settings are validated before the thread is spawned; on error the
    /// worker stays stopped.
    pub fn start(
        &mut self,
        settings: &StreamSettings,
        pacing: PacingConfig,
        destination: SharedDestination,
    ) -> Result<()> {
        self.stop();
        self.set_state(WorkerState::Starting);

        let header = match settings.header() {
            Ok(header) => header,
            Err(e) => {
                error!(error = %e, "Refusing to start stream");
                self.set_state(WorkerState::Stopped);
                return Err(e.into());
            }
        };

        let (error_tx, error_rx) = bounded::<Error>(16);
        self.error_rx = Some(error_rx);
        self.stats.reset();
        self.failed.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let sample_rate = settings.sample_rate;
        let context = WorkerContext {
            queue: self.queue.clone(),
            running: self.running.clone(),
            failed: self.failed.clone(),
            state: self.state.clone(),
            stats: self.stats.clone(),
            destination,
            error_tx,
        };

        let handle = thread::Builder::new()
            .name("vban-worker".to_string())
            .spawn(move || context.run(header, sample_rate, pacing));

        match handle {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_state(WorkerState::Stopped);
                Err(NetworkError::Spawn(e.to_string()).into())
            }
        }
    }

    /// Stop the worker and wait for its thread to finish.
    ///
    /// Anything still queued is discarded.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        self.set_state(WorkerState::Stopping);
        self.running.store(false, Ordering::Release);
        self.queue.wake();

        if handle.join().is_err() {
            error!("Streaming worker panicked");
        }

        self.queue.clear();
        self.set_state(WorkerState::Stopped);
    }

    /// Whether the worker thread is streaming
    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
            && self.running.load(Ordering::SeqCst)
            && !self.failed.load(Ordering::SeqCst)
    }

    /// Whether a fatal error ended the current stream
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Take the next fatal error reported by the worker, if any
    pub fn check_errors(&self) -> Option<Error> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    fn set_state(&self, state: WorkerState) {
        debug!(?state, "Worker state");
        *self.state.lock() = state;
    }
}

impl Drop for StreamingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread shares with its owner
struct WorkerContext {
    queue: SharedHandoffQueue,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    stats: Arc<WorkerStats>,
    destination: SharedDestination,
    error_tx: Sender<Error>,
}

impl WorkerContext {
    fn run(self, header: VbanHeader, sample_rate: f64, pacing: PacingConfig) {
        info!(
            sample_rate,
            channels = header.channels(),
            frames_per_packet = header.frames_per_packet(),
            stream_name = header.stream_name(),
            "Streaming worker started"
        );

        while self.running.load(Ordering::Acquire) && !self.failed.load(Ordering::Acquire) {
            if let Err(e) = self.run_session(&header, sample_rate, &pacing) {
                error!(error = %e, "Stream stopped on fatal error");
                // Error and state must be visible once `failed` is
                let _ = self.error_tx.try_send(e);
                *self.state.lock() = WorkerState::Failed;
                self.failed.store(true, Ordering::SeqCst);
            }
        }

        info!("Streaming worker exited");
    }

    fn run_session(
        &self,
        header: &VbanHeader,
        sample_rate: f64,
        pacing: &PacingConfig,
    ) -> Result<()> {
        let socket = udp::create_socket()?;
        let mut stream =
            StreamState::new(header.clone(), sample_rate, pacing.clone(), Instant::now());
        let mut drained = VecDeque::new();

        {
            let mut state = self.state.lock();
            if *state == WorkerState::Starting {
                *state = WorkerState::Running;
            }
        }

        while self.obtain(&mut stream, &mut drained)? {
            if let Some(datagram) = stream.poll_frame() {
                let destination = *self.destination.lock();
                self.transmit(&socket, datagram, destination);
            }
        }

        Ok(())
    }

    /// Wait for data and absorb it into `stream`.
    ///
    /// Keeps waiting for the scheduled send while packets trickle in, unless
    /// pacing is in polling mode. Returns `false` once the worker should exit.
    fn obtain(
        &self,
        stream: &mut StreamState,
        drained: &mut VecDeque<FramePacket>,
    ) -> std::result::Result<bool, StreamError> {
        loop {
            self.queue.pop_all_or_wait(stream.wait(), &self.running, drained);

            if !self.running.load(Ordering::Acquire) {
                drained.clear();
                return Ok(false);
            }
            if drained.is_empty() {
                return Ok(true);
            }

            for packet in drained.drain(..) {
                stream.absorb(&packet)?;
            }

            if stream.on_arrival(Instant::now()) {
                return Ok(true);
            }
        }
    }

    fn transmit(&self, socket: &Socket, datagram: &[u8], destination: Destination) {
        match send_datagram(socket, datagram, destination) {
            Ok(SendOutcome::Sent(bytes)) => {
                self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
            }
            Ok(SendOutcome::NoDestination) => {
                self.stats.frames_skipped.fetch_add(1, Ordering::Relaxed);
                trace!("No destination configured, datagram dropped");
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Failed to send VBAN packet");
            }
        }
    }
}

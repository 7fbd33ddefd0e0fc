//! Adaptive send pacing
//!
//! The host delivers audio in bursts sized and timed by its own callback,
//! while datagrams should leave at the steady rate implied by the sample rate.
//! [`PacingController`] decides when the worker should next try to send. It
//! starts in a priming phase that holds back output until roughly two host
//! blocks are buffered, then nudges the send interval by a small step whenever
//! the buffer runs low or grows past that threshold.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// How long the consumer should block waiting for packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Short poll, used while priming or after an underrun
    For(Duration),
    /// Wait for the next scheduled send
    Until(Instant),
}

/// Tunable constants for the pacing controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Relative step applied to the send interval when correcting
    pub adjust_ratio: f64,
    /// Smallest correction step in microseconds
    pub min_adjust_us: f64,
    /// Poll interval while waiting for more data, in microseconds
    pub poll_interval_us: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            adjust_ratio: 0.01,
            min_adjust_us: 1.0,
            poll_interval_us: 2_000,
        }
    }
}

impl PacingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingPhase {
    /// No datagram sent yet; filling up to the upper threshold
    Priming,
    /// Regular paced sends
    Steady,
}

/// Which way the last interval was corrected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    None,
    /// Buffer ran low, waiting longer
    SlowDown,
    /// Buffer grew past the upper threshold, waiting less
    SpeedUp,
}

pub struct PacingController {
    config: PacingConfig,
    /// Duration of one audio frame in microseconds
    frame_us: f64,
    /// Payload bytes consumed by one datagram
    payload_bytes: usize,
    phase: PacingPhase,
    send_soon: bool,
    next_send: Instant,
    last_packet_size: usize,
    last_correction: Correction,
}

impl PacingController {
    pub fn new(config: PacingConfig, sample_rate: f64, payload_bytes: usize, now: Instant) -> Self {
        Self {
            config,
            frame_us: 1e6 / sample_rate,
            payload_bytes,
            phase: PacingPhase::Priming,
            send_soon: true,
            next_send: now,
            last_packet_size: 0,
            last_correction: Correction::None,
        }
    }

    pub fn phase(&self) -> PacingPhase {
        self.phase
    }

    pub fn send_soon(&self) -> bool {
        self.send_soon
    }

    pub fn next_send(&self) -> Instant {
        self.next_send
    }

    pub fn last_packet_size(&self) -> usize {
        self.last_packet_size
    }

    pub fn last_correction(&self) -> Correction {
        self.last_correction
    }

    /// How long the worker should wait before its next decision
    pub fn wait(&self) -> Wait {
        if self.send_soon {
            Wait::For(self.config.poll_interval())
        } else {
            Wait::Until(self.next_send)
        }
    }

    /// Record the byte size of a packet just taken from the queue
    pub fn observe_packet(&mut self, bytes: usize) {
        self.last_packet_size = bytes;
    }

    /// Called after a wait that produced packets.
    ///
    /// Returns `true` if the worker should stop waiting and decide now; this
    /// is the case while polling, and the deadline is pulled in to `now`.
    /// Otherwise the packets are simply absorbed and the worker keeps waiting
    /// for the scheduled send.
    pub fn on_arrival(&mut self, now: Instant) -> bool {
        if self.send_soon {
            self.next_send = now;
            true
        } else {
            false
        }
    }

    /// Buffered bytes required before the first send.
    ///
    /// Twice the last packet size, raised in whole packets until it covers one
    /// packet plus one datagram payload. Zero until a non-empty packet has
    /// been seen.
    pub fn upper_threshold(&self) -> usize {
        let packet = self.last_packet_size;
        if packet == 0 {
            return 0;
        }
        let mut upper = packet * 2;
        while upper < packet + self.payload_bytes {
            upper += packet;
        }
        upper
    }

    /// Whether a send may be attempted with `buffered` bytes pending.
    ///
    /// Sets `send_soon` and returns `false` when the last packet was empty or
    /// priming has not reached the upper threshold.
    pub fn ready(&mut self, buffered: usize) -> bool {
        if self.last_packet_size == 0 {
            self.send_soon = true;
            return false;
        }

        if self.phase == PacingPhase::Priming {
            let upper = self.upper_threshold();
            if buffered < upper {
                self.send_soon = true;
                return false;
            }
            debug!(buffered, upper, "Priming complete");
            self.send_soon = false;
            self.phase = PacingPhase::Steady;
        }

        true
    }

    /// Schedule the next send after one datagram of `frames` frames went out.
    ///
    /// `remaining` is the buffered byte count after the send and `peak` the
    /// count just before it. Returns the interval added to the deadline.
    pub fn on_sent(&mut self, frames: u32, remaining: usize, peak: usize) -> Duration {
        let nominal_us = frames as f64 * self.frame_us;
        let step_us = (nominal_us * self.config.adjust_ratio).max(self.config.min_adjust_us);

        let (interval_us, correction) = if remaining < self.last_packet_size {
            (nominal_us + step_us, Correction::SlowDown)
        } else if peak > self.upper_threshold() {
            ((nominal_us - step_us).max(0.0), Correction::SpeedUp)
        } else {
            (nominal_us, Correction::None)
        };

        let interval = Duration::from_secs_f64(interval_us / 1e6);
        self.next_send += interval;
        self.send_soon = false;
        self.last_correction = correction;
        interval
    }

    /// Not enough data for a datagram when one was due
    pub fn on_underrun(&mut self) {
        self.send_soon = true;
    }
}

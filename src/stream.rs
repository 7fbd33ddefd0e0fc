//! Worker-local stream state
//!
//! [`StreamState`] ties the running interleave buffer, the framer and the
//! pacing controller together. It has no socket and no clock of its own; the
//! worker feeds it packets and timestamps, which keeps the reassembly and
//! pacing logic testable in virtual time.

use bytes::BytesMut;
use std::time::Instant;

use crate::audio::packet::FramePacket;
use crate::config::StreamConfig;
use crate::error::{ConfigError, StreamError};
use crate::pacing::{PacingConfig, PacingController, Wait};
use crate::protocol::{default_frames_per_packet, PacketFramer, VbanHeader};

/// Resolved parameters of one stream, fixed for the lifetime of a worker
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub sample_rate: f64,
    pub channels: u32,
    pub frames_per_packet: u32,
    pub stream_name: String,
}

impl StreamSettings {
    /// Combine host setup values with the configured stream options
    pub fn resolve(sample_rate: f64, channels: u32, config: &StreamConfig) -> Self {
        Self {
            sample_rate,
            channels,
            frames_per_packet: config
                .frames_per_packet
                .unwrap_or_else(|| default_frames_per_packet(channels)),
            stream_name: config.stream_name.clone(),
        }
    }

    /// Build the wire header, validating rate and sizes
    pub fn header(&self) -> Result<VbanHeader, ConfigError> {
        VbanHeader::new(
            self.sample_rate,
            self.channels,
            self.frames_per_packet,
            &self.stream_name,
        )
    }
}

pub struct StreamState {
    channels: u32,
    framer: PacketFramer,
    pacing: PacingController,
    pending: BytesMut,
}

impl StreamState {
    /// `sample_rate` is the host rate; it sets the nominal send interval,
    /// which may differ slightly from the table rate in the header.
    pub fn new(header: VbanHeader, sample_rate: f64, pacing: PacingConfig, now: Instant) -> Self {
        let channels = header.channels();
        let framer = PacketFramer::new(header);
        let pacing = PacingController::new(pacing, sample_rate, framer.payload_bytes(), now);

        Self {
            channels,
            pending: BytesMut::with_capacity(framer.payload_bytes() * 4),
            framer,
            pacing,
        }
    }

    /// How long to block on the queue before the next decision
    pub fn wait(&self) -> Wait {
        self.pacing.wait()
    }

    /// Append a packet's audio to the running buffer.
    ///
    /// A packet whose channel count differs from the stream's is rejected
    /// without touching the buffer.
    pub fn absorb(&mut self, packet: &FramePacket) -> Result<(), StreamError> {
        if packet.channel_count() != self.channels {
            return Err(StreamError::ChannelMismatch {
                expected: self.channels,
                actual: packet.channel_count(),
            });
        }

        self.pacing.observe_packet(packet.byte_len());
        packet.interleave_into(&mut self.pending);
        Ok(())
    }

    /// See [`PacingController::on_arrival`]
    pub fn on_arrival(&mut self, now: Instant) -> bool {
        self.pacing.on_arrival(now)
    }

    /// Try to produce one datagram.
    ///
    /// Returns `None` while priming, after an empty packet, or when less than
    /// one payload is buffered; pacing switches to short polls in each case.
    pub fn poll_frame(&mut self) -> Option<&[u8]> {
        let peak = self.pending.len();
        if !self.pacing.ready(peak) {
            return None;
        }

        let frames = self.framer.frames_per_packet();
        match self.framer.slice_frame(&mut self.pending) {
            Some(datagram) => {
                self.pacing.on_sent(frames, self.pending.len(), peak);
                Some(datagram)
            }
            None => {
                self.pacing.on_underrun();
                None
            }
        }
    }

    /// Interleaved bytes waiting to be framed
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn pacing(&self) -> &PacingController {
        &self.pacing
    }
}

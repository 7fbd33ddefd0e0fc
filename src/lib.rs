//! # VBAN Streamer
//!
//! Bridges a real-time audio callback to a VBAN datagram stream with steady,
//! adaptively paced output.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                         AUDIO HOST (real-time)                           │
//! │   callback ──► StreamProducer::process ──► FramePacket (owned copy)      │
//! └──────────────────────────────────┬───────────────────────────────────────┘
//!                                    │ try_lock, never blocks
//!                                    ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                   HandoffQueue (audio::buffer)                           │
//! │     ┌──────────────────────┐          ┌──────────────────────┐           │
//! │     │ active (mutex+cond)  │ ◄─merge─ │ overflow (lock-free) │           │
//! │     └──────────┬───────────┘          └──────────────────────┘           │
//! └────────────────┼─────────────────────────────────────────────────────────┘
//!                  │ pop_all_or_wait(pacing wait)
//!                  ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                 StreamingWorker thread (worker)                          │
//! │  ┌────────────────┐   ┌────────────────┐   ┌─────────────────────────┐   │
//! │  │ reinterleave   │──►│ PacketFramer   │──►│ PacingController        │   │
//! │  │ running buffer │   │ header + seq   │   │ priming / steady ±1%    │   │
//! │  └────────────────┘   └───────┬────────┘   └─────────────────────────┘   │
//! │                               ▼                                          │
//! │                UDP socket ──► Destination (read per send)                │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod bridge;
pub mod config;
pub mod error;
pub mod network;
pub mod pacing;
pub mod protocol;
pub mod state;
pub mod stream;
pub mod worker;

pub use bridge::{StreamBridge, StreamProducer};
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for the sender binary
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Default VBAN UDP port
    pub const DEFAULT_VBAN_PORT: u16 = 6980;
}

//! VBAN wire protocol

pub mod framer;
pub mod header;

pub use framer::PacketFramer;
pub use header::{default_frames_per_packet, sample_rate_index, VbanHeader, VBAN_HEADER_SIZE};

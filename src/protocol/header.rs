//! VBAN audio header
//!
//! ```text
//! 0       4      5      6      7      8                24         28
//! +-------+------+------+------+------+----------------+----------+
//! | VBAN  | SR|P | nbs  | nbc  | fmt  | stream name    | frame no |
//! +-------+------+------+------+------+----------------+----------+
//! ```
//!
//! `nbs` and `nbc` are stored minus one; the frame counter is little-endian.

use crate::error::ConfigError;

pub const VBAN_MAGIC: &[u8; 4] = b"VBAN";
pub const VBAN_HEADER_SIZE: usize = 28;
pub const VBAN_STREAM_NAME_SIZE: usize = 16;
pub const VBAN_PROTOCOL_MAX_SIZE: usize = 1464;
pub const VBAN_DATA_MAX_SIZE: usize = VBAN_PROTOCOL_MAX_SIZE - VBAN_HEADER_SIZE;

/// Largest payload a single IPv4 UDP datagram can carry
pub const UDP_MAX_DATAGRAM: usize = 65507;

/// Audio sub-protocol tag, OR'd into the sample rate byte
pub const VBAN_PROTOCOL_AUDIO: u8 = 0x00;
pub const VBAN_PROTOCOL_MASK: u8 = 0xE0;
pub const VBAN_SR_MASK: u8 = 0x1F;

/// Bit format tag for 32-bit float samples
pub const VBAN_BITFMT_32_FLOAT: u8 = 0x04;

/// Maximum frames per packet and channels per stream (both stored minus one in a byte)
pub const VBAN_MAX_FRAMES: u32 = 256;
pub const VBAN_MAX_CHANNELS: u32 = 256;

/// Supported sample rates, indexed by the value stored in the header
pub const VBAN_SR_LIST: [u32; 21] = [
    6000, 12000, 24000, 48000, 96000, 192000, 384000, 8000, 16000, 32000, 64000, 128000,
    256000, 512000, 11025, 22050, 44100, 88200, 176400, 352800, 705600,
];

/// Tolerance when matching a host sample rate against [`VBAN_SR_LIST`]
const SR_TOLERANCE_HZ: i64 = 10;

/// Map a host sample rate to its VBAN table index.
pub fn sample_rate_index(sample_rate: f64) -> Option<u8> {
    let requested = (sample_rate + 0.5) as i64;
    VBAN_SR_LIST
        .iter()
        .position(|&sr| (sr as i64 - requested).abs() < SR_TOLERANCE_HZ)
        .map(|index| index as u8)
}

/// Fixed header fields for one outbound stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbanHeader {
    sr_index: u8,
    channels: u32,
    frames_per_packet: u32,
    stream_name: [u8; VBAN_STREAM_NAME_SIZE],
}

impl VbanHeader {
    pub fn new(
        sample_rate: f64,
        channels: u32,
        frames_per_packet: u32,
        stream_name: &str,
    ) -> Result<Self, ConfigError> {
        let sr_index = sample_rate_index(sample_rate)
            .ok_or(ConfigError::UnsupportedSampleRate((sample_rate + 0.5) as u32))?;

        if channels == 0 || channels > VBAN_MAX_CHANNELS {
            return Err(ConfigError::InvalidChannelCount(channels));
        }
        if frames_per_packet == 0 || frames_per_packet > VBAN_MAX_FRAMES {
            return Err(ConfigError::InvalidFramesPerPacket(frames_per_packet));
        }

        let header = Self {
            sr_index,
            channels,
            frames_per_packet,
            stream_name: encode_stream_name(stream_name),
        };
        let size = VBAN_HEADER_SIZE + header.payload_bytes();
        if size > UDP_MAX_DATAGRAM {
            return Err(ConfigError::DatagramTooLarge {
                size,
                max: UDP_MAX_DATAGRAM,
            });
        }

        Ok(header)
    }

    pub fn sample_rate(&self) -> u32 {
        VBAN_SR_LIST[self.sr_index as usize]
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn frames_per_packet(&self) -> u32 {
        self.frames_per_packet
    }

    /// Stream name with the NUL padding stripped
    pub fn stream_name(&self) -> &str {
        let end = self
            .stream_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(VBAN_STREAM_NAME_SIZE);
        std::str::from_utf8(&self.stream_name[..end]).unwrap_or("")
    }

    /// Payload size of one datagram in bytes
    pub fn payload_bytes(&self) -> usize {
        self.frames_per_packet as usize * self.channels as usize * 4
    }

    /// Write the header with the given frame counter into `dst`.
    pub fn encode(&self, sequence: u32, dst: &mut [u8; VBAN_HEADER_SIZE]) {
        dst[0..4].copy_from_slice(VBAN_MAGIC);
        dst[4] = self.sr_index | VBAN_PROTOCOL_AUDIO;
        dst[5] = (self.frames_per_packet - 1) as u8;
        dst[6] = (self.channels - 1) as u8;
        dst[7] = VBAN_BITFMT_32_FLOAT;
        dst[8..24].copy_from_slice(&self.stream_name);
        dst[24..28].copy_from_slice(&sequence.to_le_bytes());
    }

    /// Parse an audio header, returning it with its frame counter.
    pub fn parse(data: &[u8]) -> Option<(Self, u32)> {
        if data.len() < VBAN_HEADER_SIZE || &data[0..4] != VBAN_MAGIC {
            return None;
        }
        if data[4] & VBAN_PROTOCOL_MASK != VBAN_PROTOCOL_AUDIO || data[7] != VBAN_BITFMT_32_FLOAT {
            return None;
        }
        let sr_index = data[4] & VBAN_SR_MASK;
        if sr_index as usize >= VBAN_SR_LIST.len() {
            return None;
        }

        let mut stream_name = [0u8; VBAN_STREAM_NAME_SIZE];
        stream_name.copy_from_slice(&data[8..24]);
        let sequence = u32::from_le_bytes([data[24], data[25], data[26], data[27]]);

        Some((
            Self {
                sr_index,
                frames_per_packet: data[5] as u32 + 1,
                channels: data[6] as u32 + 1,
                stream_name,
            },
            sequence,
        ))
    }
}

/// ASCII, NUL-padded, truncated to the field width. Non-ASCII characters become `?`.
fn encode_stream_name(name: &str) -> [u8; VBAN_STREAM_NAME_SIZE] {
    let mut out = [0u8; VBAN_STREAM_NAME_SIZE];
    for (slot, c) in out.iter_mut().zip(name.chars()) {
        *slot = if c.is_ascii() && c != '\0' { c as u8 } else { b'?' };
    }
    out
}

/// Default frames per packet for a channel count, keeping datagrams within
/// [`VBAN_PROTOCOL_MAX_SIZE`].
pub fn default_frames_per_packet(channels: u32) -> u32 {
    let frame_bytes = channels.max(1) as usize * 4;
    ((VBAN_DATA_MAX_SIZE / frame_bytes) as u32).clamp(1, VBAN_MAX_FRAMES)
}

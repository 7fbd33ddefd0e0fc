//! Owned copy of one host audio block
//!
//! Host buffers are only valid for the duration of the callback, so the
//! producer deep-copies them into a [`FramePacket`] before handing it off.

use bytes::BytesMut;

/// Size in bytes of one 32-bit float sample
pub const SAMPLE_BYTES: usize = 4;

/// One audio block in channel-major layout.
///
/// `samples` holds all frames of channel 0, then all frames of channel 1, and
/// so on. Each sample is stored as little-endian IEEE-754 `f32` bytes so the
/// worker can reinterleave with plain byte copies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePacket {
    channel_count: u32,
    frame_count: u32,
    samples: Vec<u8>,
}

impl FramePacket {
    /// Copy a block delivered as one slice per channel.
    ///
    /// The frame count is the length of the shortest channel.
    pub fn from_channels<S: AsRef<[f32]>>(channels: &[S]) -> Self {
        let frame_count = channels
            .iter()
            .map(|ch| ch.as_ref().len())
            .min()
            .unwrap_or(0);

        let mut samples = Vec::with_capacity(channels.len() * frame_count * SAMPLE_BYTES);
        for ch in channels {
            for sample in &ch.as_ref()[..frame_count] {
                samples.extend_from_slice(&sample.to_le_bytes());
            }
        }

        Self {
            channel_count: channels.len() as u32,
            frame_count: frame_count as u32,
            samples,
        }
    }

    /// Copy a block delivered interleaved (frame 0 ch 0, frame 0 ch 1, ...).
    ///
    /// Trailing samples that do not form a whole frame are ignored.
    pub fn from_interleaved(data: &[f32], channel_count: u16) -> Self {
        let channels = channel_count.max(1) as usize;
        let frame_count = data.len() / channels;

        let mut samples = vec![0u8; channels * frame_count * SAMPLE_BYTES];
        for (frame, chunk) in data.chunks_exact(channels).enumerate() {
            for (ch, sample) in chunk.iter().enumerate() {
                let offset = (ch * frame_count + frame) * SAMPLE_BYTES;
                samples[offset..offset + SAMPLE_BYTES].copy_from_slice(&sample.to_le_bytes());
            }
        }

        Self {
            channel_count: channels as u32,
            frame_count: frame_count as u32,
            samples,
        }
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Raw channel-major sample bytes
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Size of the sample data in bytes
    pub fn byte_len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append this packet's audio to `dst` in interleaved order.
    pub fn interleave_into(&self, dst: &mut BytesMut) {
        let frames = self.frame_count as usize;
        let channels = self.channel_count as usize;

        dst.reserve(self.samples.len());
        for frame in 0..frames {
            for ch in 0..channels {
                let offset = (frame + ch * frames) * SAMPLE_BYTES;
                dst.extend_from_slice(&self.samples[offset..offset + SAMPLE_BYTES]);
            }
        }
    }
}

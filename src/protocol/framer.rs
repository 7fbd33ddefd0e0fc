//! Slices the running interleaved buffer into VBAN datagrams

use bytes::{Buf, BytesMut};

use crate::protocol::header::{VbanHeader, VBAN_HEADER_SIZE};

/// Builds outbound datagrams and owns the stream's frame counter.
///
/// The datagram buffer is allocated once; every slice overwrites it in place.
pub struct PacketFramer {
    header: VbanHeader,
    datagram: Vec<u8>,
    payload_bytes: usize,
    sequence: u32,
}

impl PacketFramer {
    pub fn new(header: VbanHeader) -> Self {
        let payload_bytes = header.payload_bytes();
        Self {
            header,
            datagram: vec![0u8; VBAN_HEADER_SIZE + payload_bytes],
            payload_bytes,
            sequence: 0,
        }
    }

    /// Start counting from `sequence` instead of zero
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Payload bytes carried by one datagram
    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    pub fn frames_per_packet(&self) -> u32 {
        self.header.frames_per_packet()
    }

    /// Counter value the next datagram will carry
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Take one payload's worth of the oldest bytes from `buffer`.
    ///
    /// Returns the complete datagram (header + payload), or `None` when the
    /// buffer does not hold a full payload yet. The counter advances on every
    /// datagram produced, whether or not the caller manages to send it.
    pub fn slice_frame(&mut self, buffer: &mut BytesMut) -> Option<&[u8]> {
        if buffer.len() < self.payload_bytes {
            return None;
        }

        let (head, payload) = self.datagram.split_at_mut(VBAN_HEADER_SIZE);
        let head: &mut [u8; VBAN_HEADER_SIZE] = head.try_into().ok()?;
        self.header.encode(self.sequence, head);
        payload.copy_from_slice(&buffer[..self.payload_bytes]);
        buffer.advance(self.payload_bytes);

        self.sequence = self.sequence.wrapping_add(1);
        Some(&self.datagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer(frames: u32) -> PacketFramer {
        PacketFramer::new(VbanHeader::new(48000.0, 2, frames, "test").unwrap())
    }

    #[test]
    fn test_insufficient_data() {
        let mut framer = framer(4);
        let mut buffer = BytesMut::from(&[0u8; 31][..]);

        assert!(framer.slice_frame(&mut buffer).is_none());
        assert_eq!(buffer.len(), 31);
        assert_eq!(framer.sequence(), 0);
    }

    #[test]
    fn test_slice_count_and_size() {
        let mut framer = framer(4);
        let frame_bytes = framer.payload_bytes();
        assert_eq!(frame_bytes, 32);

        for (k, r) in [(0usize, 0usize), (1, 0), (3, 5), (7, 31)] {
            let mut buffer = BytesMut::from(&vec![0u8; k * frame_bytes + r][..]);
            let mut slices = 0;
            while let Some(datagram) = framer.slice_frame(&mut buffer) {
                assert_eq!(datagram.len(), VBAN_HEADER_SIZE + frame_bytes);
                slices += 1;
            }
            assert_eq!(slices, k);
            assert_eq!(buffer.len(), r);
        }
    }

    #[test]
    fn test_oldest_bytes_first() {
        let mut framer = framer(1);
        let mut buffer = BytesMut::from(&(0u8..24).collect::<Vec<_>>()[..]);

        let first = framer.slice_frame(&mut buffer).unwrap().to_vec();
        assert_eq!(&first[VBAN_HEADER_SIZE..], &(0u8..8).collect::<Vec<_>>()[..]);

        let second = framer.slice_frame(&mut buffer).unwrap().to_vec();
        assert_eq!(&second[VBAN_HEADER_SIZE..], &(8u8..16).collect::<Vec<_>>()[..]);
        assert_eq!(&buffer[..], &(16u8..24).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn test_sequence_increments() {
        let mut framer = framer(1);
        let mut buffer = BytesMut::from(&[0u8; 8 * 5][..]);

        let mut seen = Vec::new();
        while let Some(datagram) = framer.slice_frame(&mut buffer) {
            let (_, sequence) = VbanHeader::parse(datagram).unwrap();
            seen.push(sequence);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut framer = framer(1).with_sequence(u32::MAX - 1);
        let mut buffer = BytesMut::from(&[0u8; 8 * 4][..]);

        let mut seen = Vec::new();
        while let Some(datagram) = framer.slice_frame(&mut buffer) {
            let (_, sequence) = VbanHeader::parse(datagram).unwrap();
            seen.push(sequence);
        }
        assert_eq!(seen, vec![u32::MAX - 1, u32::MAX, 0, 1]);
        assert_eq!(framer.sequence(), 2);
    }
}

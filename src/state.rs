//! Persisted host state
//!
//! The host stores an opaque blob per instance. Layout, all fields in network
//! byte order:
//!
//! ```text
//! 0        4          8      10
//! +--------+----------+------+
//! | version| address  | port |
//! +--------+----------+------+
//! ```
//!
//! The version packs `major << 24 | minor << 16 | patch`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

use crate::error::ConfigError;
use crate::network::Destination;

pub const STATE_SIZE: usize = 10;

/// Version of the blob layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u16,
}

impl StateVersion {
    /// Layout written by this build; any newer major version is rejected
    pub const CURRENT: StateVersion = StateVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    pub fn pack(self) -> u32 {
        (self.major as u32) << 24 | (self.minor as u32) << 16 | self.patch as u32
    }

    pub fn unpack(value: u32) -> Self {
        Self {
            major: (value >> 24) as u8,
            minor: (value >> 16) as u8,
            patch: value as u16,
        }
    }
}

/// Everything the bridge persists between host sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistedState {
    pub destination: Destination,
}

impl PersistedState {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(STATE_SIZE);
        buf.put_u32(StateVersion::CURRENT.pack());
        buf.put_u32(u32::from(self.destination.address));
        buf.put_u16(self.destination.port);
        buf.freeze()
    }

    /// Parse a blob. Newer major versions and short blobs are rejected.
    ///
    /// Minor and patch bumps of the current major are accepted; any bytes
    /// beyond the known fields are ignored.
    pub fn decode(mut data: &[u8]) -> Result<Self, ConfigError> {
        if data.len() < 4 {
            return Err(ConfigError::TruncatedState {
                expected: STATE_SIZE,
                actual: data.len(),
            });
        }

        let version = StateVersion::unpack(data.get_u32());
        if version.major > StateVersion::CURRENT.major {
            return Err(ConfigError::UnsupportedStateVersion {
                major: version.major,
                minor: version.minor,
                patch: version.patch,
            });
        }

        if data.remaining() < STATE_SIZE - 4 {
            return Err(ConfigError::TruncatedState {
                expected: STATE_SIZE,
                actual: data.remaining() + 4,
            });
        }

        let address = Ipv4Addr::from(data.get_u32());
        let port = data.get_u16();
        Ok(Self {
            destination: Destination::new(address, port),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let state = PersistedState {
            destination: Destination::new(Ipv4Addr::new(192, 168, 1, 10), 6980),
        };
        let blob = state.encode();

        assert_eq!(
            &blob[..],
            &[0x01, 0x00, 0x00, 0x00, 192, 168, 1, 10, 0x1B, 0x44]
        );
        assert_eq!(PersistedState::decode(&blob).unwrap(), state);
    }

    #[test]
    fn test_version_packing() {
        let version = StateVersion {
            major: 1,
            minor: 2,
            patch: 515,
        };
        assert_eq!(version.pack(), 0x0102_0203);
        assert_eq!(StateVersion::unpack(0x0102_0203), version);
    }

    #[test]
    fn test_newer_major_rejected() {
        let blob = [0x02, 0x00, 0x00, 0x00, 10, 0, 0, 1, 0x1B, 0x44];
        let err = PersistedState::decode(&blob).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedStateVersion { major: 2, .. }
        ));
    }

    #[test]
    fn test_newer_minor_accepted() {
        let blob = [0x01, 0x05, 0x00, 0x01, 10, 0, 0, 1, 0x1B, 0x45, 0xFF];
        let state = PersistedState::decode(&blob).unwrap();
        assert_eq!(state.destination, Destination::new(Ipv4Addr::new(10, 0, 0, 1), 6981));
    }

    #[test]
    fn test_truncated_rejected() {
        assert!(matches!(
            PersistedState::decode(&[0x01, 0x00]),
            Err(ConfigError::TruncatedState { actual: 2, .. })
        ));
        assert!(matches!(
            PersistedState::decode(&[0x01, 0x00, 0x00, 0x00, 10, 0, 0]),
            Err(ConfigError::TruncatedState { actual: 7, .. })
        ));
    }
}

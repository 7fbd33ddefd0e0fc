//! Error types for the VBAN streamer

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while validating settings, config files or persisted state.
///
/// All of these are detected before the worker starts; none of them leave
/// the bridge in a partially applied state.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("VBAN cannot send the requested sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("Invalid channel count: {0} (expected 1..=256)")]
    InvalidChannelCount(u32),

    #[error("Invalid frames per packet: {0} (expected 1..=256)")]
    InvalidFramesPerPacket(u32),

    #[error("Datagram of {size} bytes exceeds the UDP limit of {max}")]
    DatagramTooLarge { size: usize, max: usize },

    #[error("Persisted state version {major}.{minor}.{patch} is newer than supported")]
    UnsupportedStateVersion { major: u8, minor: u8, patch: u16 },

    #[error("Persisted state truncated: expected {expected} bytes, got {actual}")]
    TruncatedState { expected: usize, actual: usize },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

/// Fatal conditions that end a running stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Channel count mismatch: stream has {expected}, packet has {actual}")]
    ChannelMismatch { expected: u32, actual: u32 },
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket creation failed: {0}")]
    SocketCreate(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

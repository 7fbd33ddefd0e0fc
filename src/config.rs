//! Application configuration
//!
//! Loaded from a TOML file. Every section has defaults, so an empty or
//! partial file is valid.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::network::Destination;
use crate::pacing::PacingConfig;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub destination: Destination,
    pub pacing: PacingConfig,
    pub capture: CaptureConfig,
}

/// Outbound stream options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Name carried in every VBAN header (ASCII, at most 16 bytes)
    pub stream_name: String,
    /// Frames per datagram; derived from the channel count when unset
    pub frames_per_packet: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "Stream1".to_string(),
            frames_per_packet: None,
        }
    }
}

/// Input capture options for the sender binary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Input device name; the host default is used when unset
    pub device: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from `path` if it exists, otherwise return defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config = toml::from_str(contents).map_err(ConfigError::from)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::from)?;
        Ok(contents)
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Platform config location, e.g. `~/.config/vban-streamer/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("net", "vban", "vban-streamer").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.stream.stream_name, "Stream1");
        assert_eq!(config.destination.port, 6980);
        assert_eq!(config.pacing.poll_interval_us, 2_000);
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml(
            r#"
            [destination]
            address = "10.0.0.5"

            [pacing]
            adjust_ratio = 0.02

            [stream]
            frames_per_packet = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.destination.address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(config.destination.port, 6980);
        assert_eq!(config.pacing.adjust_ratio, 0.02);
        assert_eq!(config.pacing.min_adjust_us, 1.0);
        assert_eq!(config.stream.frames_per_packet, Some(128));
        assert_eq!(config.stream.stream_name, "Stream1");
    }

    #[test]
    fn test_invalid_file_rejected() {
        let err = AppConfig::from_toml("[destination]\naddress = \"not-an-ip\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("vban-streamer-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.destination = Destination::new(Ipv4Addr::new(192, 168, 0, 9), 7001);
        config.capture.device = Some("Line In".to_string());
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
        assert_eq!(AppConfig::load_or_default(dir.join("missing.toml")).unwrap(), AppConfig::default());

        fs::remove_dir_all(&dir).unwrap();
    }
}

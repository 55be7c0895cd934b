//! Configuration file support for the tuner CLI tools

use hdhr_stream::VideoConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which tuner to talk to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device string: `<id>[-<tuner>]`, `<ip>[-<tuner>]` or `<multicast ip>:<port>`
    pub device: String,
    /// Lock key to present on `set`, if one was acquired elsewhere
    pub lockkey: Option<u32>,
}

/// Video receiver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSection {
    /// Local UDP port (0 = pick one)
    #[serde(default)]
    pub listen_port: u16,
    /// Ring buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Statistics interval in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_buffer_size() -> usize {
    VideoConfig::default().buffer_size * 2
}

fn default_stats_interval() -> u64 {
    1
}

impl Default for VideoSection {
    fn default() -> Self {
        VideoSection {
            listen_port: 0,
            buffer_size: default_buffer_size(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

/// Channel scan settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Channel map to scan; read from the tuner when absent
    pub channelmap: Option<String>,
    /// Write results here instead of stdout
    pub output: Option<String>,
}

/// Combined configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub device: Option<DeviceConfig>,
    #[serde(default)]
    pub video: VideoSection,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.video.buffer_size == 0 {
            return Err(ConfigError::Invalid("video.buffer_size must be non-zero".into()));
        }
        if let Some(device) = &self.device {
            if device.device.trim().is_empty() {
                return Err(ConfigError::Invalid("device.device is empty".into()));
            }
        }
        Ok(())
    }

    /// Create example configuration
    pub fn example() -> Self {
        Config {
            device: Some(DeviceConfig {
                device: "FFFFFFFF-0".to_string(),
                lockkey: None,
            }),
            video: VideoSection::default(),
            scan: ScanConfig {
                channelmap: Some("us-bcast".to_string()),
                output: None,
            },
        }
    }
}

impl VideoSection {
    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Receiver settings for a video engine
    pub fn video_config(&self) -> VideoConfig {
        VideoConfig {
            listen_port: self.listen_port,
            buffer_size: self.buffer_size,
            ..VideoConfig::default()
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

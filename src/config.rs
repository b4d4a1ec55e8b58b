//! Relay configuration
//!
//! Loaded from a TOML file when one exists, otherwise defaults matching the
//! hardware the relay is normally deployed with (camera 0, 640x480 @ 30 fps,
//! 44.1 kHz mono microphone).

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration for the relay process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub http_port: u16,
}

/// Camera and frame encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Camera index, treated as an opaque input
    pub camera_index: u32,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

/// Microphone selection and chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Explicit input device index; when unset the keyword heuristic runs
    pub device_index: Option<usize>,
    /// Device name keywords tried before falling back to the default input
    pub keywords: Vec<String>,
    pub sample_rate: u32,
    pub chunk_samples: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_index: None,
            keywords: vec![
                "USB".to_string(),
                "Webcam".to_string(),
                "Camera".to_string(),
            ],
            sample_rate: SAMPLE_RATE,
            chunk_samples: CHUNK_SAMPLES,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Socket address the HTTP server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.bind_address, self.server.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_hardware() {
        let config = RelayConfig::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.video.camera_index, 0);
        assert_eq!(config.video.width, 640);
        assert_eq!(config.video.height, 480);
        assert_eq!(config.video.jpeg_quality, 85);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.chunk_samples, 1024);
        assert!(config.audio.device_index.is_none());
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [server]
            http_port = 9000

            [audio]
            device_index = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.server.http_port, 9000);
        assert_eq!(config.audio.device_index, Some(3));
        // Untouched sections keep their defaults
        assert_eq!(config.video.jpeg_quality, 85);
        assert_eq!(config.server.bind_address, "0.0.0.0");
    }

    #[test]
    fn bind_addr_parses() {
        let config = RelayConfig::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = RelayConfig::load(Path::new("/nonexistent/relay.toml")).unwrap();
        assert_eq!(config.server.http_port, 8080);
    }
}

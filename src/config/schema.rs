use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::video::format::{PixelFormat, Resolution};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Video capture settings
    pub video: VideoConfig,
    /// Streaming settings
    pub stream: StreamConfig,
    /// Web server settings
    pub web: WebConfig,
}

/// Where frames come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// V4L2 capture device
    #[default]
    V4l2,
    /// Synthetic frames, no hardware required
    TestPattern,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::V4l2 => write!(f, "v4l2"),
            SourceKind::TestPattern => write!(f, "test-pattern"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v4l2" => Ok(SourceKind::V4l2),
            "test-pattern" | "pattern" | "test" => Ok(SourceKind::TestPattern),
            _ => Err(format!("Unknown frame source: {}", s)),
        }
    }
}

/// Video capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame source backend
    pub source: SourceKind,
    /// Video device path (e.g., /dev/video0)
    pub device: String,
    /// Video pixel format (e.g., "MJPEG", "YUYV", "NV12")
    pub format: String,
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// Frame rate (0 = device default)
    pub fps: u32,
    /// Number of memory-mapped capture buffers
    pub buffer_count: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::V4l2,
            device: "/dev/video0".to_string(),
            format: "MJPEG".to_string(),
            width: 640,
            height: 480,
            fps: 30,
            buffer_count: 2,
        }
    }
}

impl VideoConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Parsed pixel format, falling back to MJPEG for unknown names
    pub fn pixel_format(&self) -> PixelFormat {
        self.format.parse().unwrap_or_else(|e| {
            tracing::warn!("{}, using MJPEG", e);
            PixelFormat::Mjpeg
        })
    }
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// JPEG quality used when re-encoding raw frames (1-100)
    pub jpeg_quality: u32,
    /// Per-frame capture deadline in milliseconds (0 = wait indefinitely)
    pub frame_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            frame_timeout_ms: 0,
        }
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTP port
    pub http_port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

//! Encoder seam

use bytes::Bytes;

use crate::error::Result;
use crate::video::format::{PixelFormat, Resolution};

/// What an encoder instance is built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub resolution: Resolution,
    pub input_format: PixelFormat,
    /// JPEG quality, 1-100
    pub quality: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::jpeg(Resolution::VGA, PixelFormat::Yuyv, super::DEFAULT_JPEG_QUALITY)
    }
}

impl EncoderConfig {
    pub fn jpeg(resolution: Resolution, input_format: PixelFormat, quality: u32) -> Self {
        Self {
            resolution,
            input_format,
            quality: quality.clamp(1, 100),
        }
    }
}

/// Turns one raw frame into one JPEG
///
/// Instances hold codec state and are used from one session at a time, so
/// only `Send` is required.
pub trait Encoder: Send {
    fn name(&self) -> &str;

    /// Encode a frame whose lines are `stride` bytes apart (0 = tightly packed)
    fn encode(&mut self, data: &[u8], stride: u32, sequence: u64) -> Result<Bytes>;

    fn config(&self) -> &EncoderConfig;
}

/// Creates encoders on demand
pub trait EncoderFactory: Send + Sync {
    fn create(&self, config: EncoderConfig) -> Result<Box<dyn Encoder>>;

    fn encoder_type(&self) -> &str;
}

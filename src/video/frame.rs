//! Video frame data structures

use bytes::Bytes;
use std::time::Instant;

use super::format::{PixelFormat, Resolution};

/// Encoding of a captured frame as seen by the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEncoding {
    /// Already JPEG, sent as-is
    Jpeg,
    /// Raw sensor data that must be re-encoded before sending
    Raw,
}

/// A captured video frame with metadata
///
/// Frames are handed out by a [`FrameSource`](super::source::FrameSource) and
/// must be given back through `release` once the caller is done with them.
/// Not `Clone`: each frame is released exactly once.
#[derive(Debug)]
pub struct VideoFrame {
    /// Frame data
    data: Bytes,
    /// Frame resolution
    pub resolution: Resolution,
    /// Pixel format
    pub format: PixelFormat,
    /// Stride (bytes per line)
    pub stride: u32,
    /// Frame sequence number
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub capture_ts: Instant,
}

impl VideoFrame {
    /// Create a new video frame
    pub fn new(
        data: Bytes,
        resolution: Resolution,
        format: PixelFormat,
        stride: u32,
        sequence: u64,
    ) -> Self {
        Self {
            data,
            resolution,
            format,
            stride,
            sequence,
            capture_ts: Instant::now(),
        }
    }

    /// Create a frame from a Vec<u8>
    pub fn from_vec(
        data: Vec<u8>,
        resolution: Resolution,
        format: PixelFormat,
        stride: u32,
        sequence: u64,
    ) -> Self {
        Self::new(Bytes::from(data), resolution, format, stride, sequence)
    }

    /// Get frame data as bytes slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get frame data as Bytes (cheap clone)
    pub fn data_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Get data length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time since capture
    pub fn age(&self) -> std::time::Duration {
        self.capture_ts.elapsed()
    }

    pub fn encoding(&self) -> FrameEncoding {
        if self.format.is_compressed() {
            FrameEncoding::Jpeg
        } else {
            FrameEncoding::Raw
        }
    }

    /// JPEG-encoded with intact SOI/EOI markers
    pub fn is_valid_jpeg(&self) -> bool {
        self.encoding() == FrameEncoding::Jpeg && is_valid_jpeg(&self.data)
    }
}

/// Check SOI/EOI markers of a JPEG buffer
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    const MIN_JPEG_LEN: usize = 125;
    if data.len() < MIN_JPEG_LEN || !data.starts_with(&[0xFF, 0xD8]) {
        return false;
    }
    // Some UVC cameras pad after EOI or drop its first byte
    matches!(data[data.len() - 2..], [0xFF, 0xD9] | [0xD9, 0x00] | [0x00, 0x00])
}

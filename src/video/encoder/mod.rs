//! JPEG encoding for the stream
//!
//! [`FrameEncoder`] guarantees that whatever a frame source produced leaves
//! as JPEG: compressed frames pass through untouched, raw frames are
//! compressed by an [`Encoder`] created on demand.

pub mod jpeg;
pub mod traits;

use tracing::debug;

use crate::error::StreamError;
use crate::video::frame::{FrameEncoding, VideoFrame};

pub use jpeg::{JpegEncoder, JpegEncoderFactory};
pub use traits::{Encoder, EncoderConfig, EncoderFactory};

/// Default quality for re-encoded raw frames
pub const DEFAULT_JPEG_QUALITY: u32 = 80;

/// A frame guaranteed to be JPEG
#[derive(Debug)]
pub enum EncodedFrame<'a> {
    /// Source frame was already JPEG; its bytes are used as-is
    Passthrough(&'a VideoFrame),
    /// Freshly compressed copy owned by the caller
    Reencoded(bytes::Bytes),
}

impl EncodedFrame<'_> {
    pub fn data(&self) -> &[u8] {
        match self {
            EncodedFrame::Passthrough(frame) => frame.data(),
            EncodedFrame::Reencoded(data) => data,
        }
    }

    /// JPEG payload as `Bytes` (a reference-count bump, never a copy)
    pub fn to_bytes(&self) -> bytes::Bytes {
        match self {
            EncodedFrame::Passthrough(frame) => frame.data_bytes(),
            EncodedFrame::Reencoded(data) => data.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn is_reencoded(&self) -> bool {
        matches!(self, EncodedFrame::Reencoded(_))
    }
}

/// Per-session JPEG encoder
///
/// The backend encoder is created lazily and recreated whenever the input
/// resolution or pixel format changes.
pub struct FrameEncoder {
    quality: u32,
    factory: Box<dyn EncoderFactory>,
    encoder: Option<Box<dyn Encoder>>,
}

impl FrameEncoder {
    /// Encoder backed by turbojpeg
    pub fn new(quality: u32) -> Self {
        Self::with_factory(quality, Box::new(JpegEncoderFactory))
    }

    pub fn with_factory(quality: u32, factory: Box<dyn EncoderFactory>) -> Self {
        Self {
            quality,
            factory,
            encoder: None,
        }
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Make sure `frame` is JPEG
    ///
    /// On failure the frame is untouched and still owned by the caller.
    pub fn encode<'a>(&mut self, frame: &'a VideoFrame) -> Result<EncodedFrame<'a>, StreamError> {
        match frame.encoding() {
            FrameEncoding::Jpeg => Ok(EncodedFrame::Passthrough(frame)),
            FrameEncoding::Raw => {
                let encoder = self.encoder_for(frame)?;
                encoder
                    .encode(frame.data(), frame.stride, frame.sequence)
                    .map(EncodedFrame::Reencoded)
                    .map_err(|e| StreamError::Encode(e.to_string()))
            }
        }
    }

    fn encoder_for(&mut self, frame: &VideoFrame) -> Result<&mut Box<dyn Encoder>, StreamError> {
        let reusable = self.encoder.take().filter(|enc| {
            let config = enc.config();
            config.resolution == frame.resolution && config.input_format == frame.format
        });

        let encoder = match reusable {
            Some(enc) => enc,
            None => {
                let config = EncoderConfig::jpeg(frame.resolution, frame.format, self.quality);
                let enc = self
                    .factory
                    .create(config)
                    .map_err(|e| StreamError::Encode(e.to_string()))?;
                debug!(
                    "Created {} encoder via {} for {} {}",
                    enc.name(),
                    self.factory.encoder_type(),
                    frame.resolution,
                    frame.format
                );
                enc
            }
        };

        Ok(self.encoder.insert(encoder))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::video::format::{PixelFormat, Resolution};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Factory producing encoders that emit a fixed-size payload or fail
    pub(crate) struct FakeFactory {
        pub created: Arc<AtomicUsize>,
        pub output_len: Option<usize>,
    }

    impl FakeFactory {
        pub(crate) fn producing(len: usize) -> Self {
            Self {
                created: Arc::new(AtomicUsize::new(0)),
                output_len: Some(len),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                created: Arc::new(AtomicUsize::new(0)),
                output_len: None,
            }
        }
    }

    struct FakeEncoder {
        config: EncoderConfig,
        output_len: Option<usize>,
    }

    impl Encoder for FakeEncoder {
        fn name(&self) -> &str {
            "fake"
        }

        fn encode(&mut self, _data: &[u8], _stride: u32, _sequence: u64) -> Result<Bytes> {
            match self.output_len {
                Some(len) => Ok(Bytes::from(vec![0xAB; len])),
                None => Err(AppError::VideoError("compressor refused frame".into())),
            }
        }

        fn config(&self) -> &EncoderConfig {
            &self.config
        }
    }

    impl EncoderFactory for FakeFactory {
        fn create(&self, config: EncoderConfig) -> Result<Box<dyn Encoder>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeEncoder {
                config,
                output_len: self.output_len,
            }))
        }

        fn encoder_type(&self) -> &str {
            "fake"
        }
    }

    fn raw_frame(resolution: Resolution) -> VideoFrame {
        let len = PixelFormat::Yuyv.frame_size(resolution).unwrap();
        VideoFrame::from_vec(vec![0x10; len], resolution, PixelFormat::Yuyv, 0, 1)
    }

    #[test]
    fn test_jpeg_passes_through_without_copy() {
        let factory = FakeFactory::producing(500);
        let created = factory.created.clone();
        let mut encoder = FrameEncoder::with_factory(80, Box::new(factory));

        let frame = VideoFrame::from_vec(vec![0xFF; 1000], Resolution::VGA, PixelFormat::Mjpeg, 0, 1);
        let encoded = encoder.encode(&frame).unwrap();

        assert!(!encoded.is_reencoded());
        assert_eq!(encoded.data(), frame.data());
        assert!(std::ptr::eq(encoded.data().as_ptr(), frame.data().as_ptr()));
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_raw_frame_is_reencoded() {
        let mut encoder = FrameEncoder::with_factory(80, Box::new(FakeFactory::producing(500)));
        let frame = raw_frame(Resolution::QVGA);

        let encoded = encoder.encode(&frame).unwrap();
        assert!(encoded.is_reencoded());
        assert_eq!(encoded.len(), 500);
    }

    #[test]
    fn test_encode_failure_is_encode_error() {
        let mut encoder = FrameEncoder::with_factory(80, Box::new(FakeFactory::failing()));
        let frame = raw_frame(Resolution::QVGA);

        let err = encoder.encode(&frame).unwrap_err();
        assert!(matches!(err, StreamError::Encode(_)));
        // Frame is still intact for the caller to release
        assert_eq!(frame.len(), 320 * 240 * 2);
    }

    #[test]
    fn test_encoder_reused_until_geometry_changes() {
        let factory = FakeFactory::producing(10);
        let created = factory.created.clone();
        let mut encoder = FrameEncoder::with_factory(80, Box::new(factory));

        encoder.encode(&raw_frame(Resolution::QVGA)).unwrap();
        encoder.encode(&raw_frame(Resolution::QVGA)).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);

        encoder.encode(&raw_frame(Resolution::VGA)).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsupported_raw_format_with_real_encoder() {
        let mut encoder = FrameEncoder::new(DEFAULT_JPEG_QUALITY);
        let frame = VideoFrame::from_vec(vec![0; 64], Resolution::new(4, 8), PixelFormat::Rgb565, 0, 1);
        assert!(matches!(encoder.encode(&frame), Err(StreamError::Encode(_))));
    }
}

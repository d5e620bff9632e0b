//! JPEG encoder implementation
//!
//! Provides JPEG encoding for raw video frames. YUV inputs are normalised to
//! I420 and handed to turbojpeg's YUV encoder (skips internal color
//! conversion); RGB, BGR and greyscale go through the packed-pixel path.

use bytes::Bytes;

use super::traits::{Encoder, EncoderConfig, EncoderFactory};
use crate::error::{AppError, Result};
use crate::video::convert::PixelConverter;
use crate::video::format::{PixelFormat, Resolution};

/// JPEG encoder using turbojpeg
///
/// Encoding pipeline:
/// ```text
/// YUYV/YVYU/UYVY/NV12/YV12 ──convert──> I420 ──turbojpeg──> JPEG
/// RGB24/BGR24/GREY ──────────────────────────turbojpeg──> JPEG
/// ```
///
/// Note: This encoder is NOT thread-safe due to turbojpeg limitations.
/// Each stream session owns its own instance.
pub struct JpegEncoder {
    config: EncoderConfig,
    compressor: turbojpeg::Compressor,
    /// Present for YUV inputs only
    converter: Option<PixelConverter>,
}

impl JpegEncoder {
    /// Create a new JPEG encoder
    pub fn new(config: EncoderConfig) -> Result<Self> {
        if !Self::is_supported(config.input_format) {
            return Err(AppError::VideoError(format!(
                "Unsupported input format for JPEG: {}",
                config.input_format
            )));
        }

        let mut compressor = turbojpeg::Compressor::new().map_err(|e| {
            AppError::VideoError(format!("Failed to create turbojpeg compressor: {}", e))
        })?;

        compressor
            .set_quality(config.quality.min(100) as i32)
            .map_err(|e| AppError::VideoError(format!("Failed to set JPEG quality: {}", e)))?;

        let subsamp = if config.input_format == PixelFormat::Grey {
            turbojpeg::Subsamp::Gray
        } else {
            turbojpeg::Subsamp::Sub2x2
        };
        compressor
            .set_subsamp(subsamp)
            .map_err(|e| AppError::VideoError(format!("Failed to set JPEG subsampling: {}", e)))?;

        let converter = if PixelConverter::supports(config.input_format) {
            Some(PixelConverter::to_i420(config.input_format, config.resolution)?)
        } else {
            None
        };

        Ok(Self {
            config,
            compressor,
            converter,
        })
    }

    /// Create with specific quality
    pub fn with_quality(resolution: Resolution, input_format: PixelFormat, quality: u32) -> Result<Self> {
        Self::new(EncoderConfig::jpeg(resolution, input_format, quality))
    }

    fn is_supported(format: PixelFormat) -> bool {
        PixelConverter::supports(format)
            || matches!(
                format,
                PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Grey
            )
    }

    /// Encode through the I420 path
    fn encode_yuv(&mut self, data: &[u8], stride: u32) -> Result<Vec<u8>> {
        let width = self.config.resolution.width as usize;
        let height = self.config.resolution.height as usize;

        let Some(converter) = self.converter.as_mut() else {
            return Err(AppError::Internal(
                "YUV path used without a converter".to_string(),
            ));
        };
        let i420 = converter.convert(data, stride)?;

        // Create YuvImage for turbojpeg (I420 = YUV420 = Sub2x2)
        let yuv_image = turbojpeg::YuvImage {
            pixels: i420,
            width,
            height,
            align: 1, // No padding between rows
            subsamp: turbojpeg::Subsamp::Sub2x2,
        };

        self.compressor
            .compress_yuv_to_vec(yuv_image)
            .map_err(|e| AppError::VideoError(format!("JPEG compression failed: {}", e)))
    }

    /// Encode packed RGB/BGR/GREY pixels directly
    fn encode_packed(&mut self, data: &[u8], stride: u32) -> Result<Vec<u8>> {
        let width = self.config.resolution.width as usize;
        let height = self.config.resolution.height as usize;
        let min_pitch = self.config.input_format.min_stride(self.config.resolution.width) as usize;
        let pitch = if stride == 0 { min_pitch } else { stride as usize };

        if pitch < min_pitch || data.len() < pitch * height {
            return Err(AppError::VideoError(format!(
                "{} data too small: {} bytes for {} (pitch {})",
                self.config.input_format,
                data.len(),
                self.config.resolution,
                pitch
            )));
        }

        let format = match self.config.input_format {
            PixelFormat::Rgb24 => turbojpeg::PixelFormat::RGB,
            PixelFormat::Bgr24 => turbojpeg::PixelFormat::BGR,
            _ => turbojpeg::PixelFormat::GRAY,
        };

        let image = turbojpeg::Image {
            pixels: &data[..pitch * height],
            width,
            pitch,
            height,
            format,
        };

        self.compressor
            .compress_to_vec(image)
            .map_err(|e| AppError::VideoError(format!("JPEG compression failed: {}", e)))
    }
}

impl Encoder for JpegEncoder {
    fn name(&self) -> &str {
        "JPEG (turbojpeg)"
    }

    fn encode(&mut self, data: &[u8], stride: u32, _sequence: u64) -> Result<Bytes> {
        let jpeg = if self.converter.is_some() {
            self.encode_yuv(data, stride)?
        } else {
            self.encode_packed(data, stride)?
        };
        Ok(Bytes::from(jpeg))
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

/// Factory for [`JpegEncoder`]
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegEncoderFactory;

impl EncoderFactory for JpegEncoderFactory {
    fn create(&self, config: EncoderConfig) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(JpegEncoder::new(config)?))
    }

    fn encoder_type(&self) -> &str {
        "turbojpeg"
    }
}

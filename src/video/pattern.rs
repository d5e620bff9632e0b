//! Synthetic frame source
//!
//! Scrolling colour bars at a fixed rate, for running the server without a
//! camera. MJPEG output is produced by compressing the RGB pattern, so both
//! the passthrough and the re-encode paths of the stream can be exercised.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::encoder::{Encoder, JpegEncoder, DEFAULT_JPEG_QUALITY};
use super::format::{PixelFormat, Resolution};
use super::frame::VideoFrame;
use super::source::FrameSource;
use crate::error::{AppError, Result};

/// 75% colour bars: white, yellow, cyan, green, magenta, red, blue, black
const BARS: [[u8; 3]; 8] = [
    [191, 191, 191],
    [191, 191, 0],
    [0, 191, 191],
    [0, 191, 0],
    [191, 0, 191],
    [191, 0, 0],
    [0, 0, 191],
    [0, 0, 0],
];

/// Pixels the pattern moves per frame
const SCROLL_STEP: u32 = 4;

/// Frame source producing generated frames
pub struct TestPatternSource {
    resolution: Resolution,
    format: PixelFormat,
    interval: Option<Duration>,
    next_tick: Mutex<Instant>,
    jpeg: Option<Mutex<JpegEncoder>>,
    sequence: AtomicU64,
    in_flight: AtomicUsize,
}

impl TestPatternSource {
    /// `fps` of 0 produces frames as fast as they are requested
    pub fn new(resolution: Resolution, format: PixelFormat, fps: u32) -> Result<Self> {
        // YUYV is re-encoded through I420, which needs an even height too
        let odd_height = format == PixelFormat::Yuyv && resolution.height % 2 != 0;
        if !resolution.is_valid() || resolution.width % 2 != 0 || odd_height {
            return Err(AppError::VideoError(format!(
                "Unsupported test pattern resolution {}",
                resolution
            )));
        }

        let jpeg = match format {
            PixelFormat::Mjpeg | PixelFormat::Jpeg => Some(Mutex::new(JpegEncoder::with_quality(
                resolution,
                PixelFormat::Rgb24,
                DEFAULT_JPEG_QUALITY,
            )?)),
            PixelFormat::Yuyv | PixelFormat::Rgb24 | PixelFormat::Grey => None,
            other => {
                return Err(AppError::VideoError(format!(
                    "Test pattern cannot produce {}",
                    other
                )))
            }
        };

        info!("Test pattern source: {} {} @ {} fps", resolution, format, fps);

        Ok(Self {
            resolution,
            format,
            interval: (fps > 0).then(|| Duration::from_secs(1) / fps),
            next_tick: Mutex::new(Instant::now()),
            jpeg,
            sequence: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Reserve the next frame slot and return when it is due
    fn schedule(&self) -> Option<Instant> {
        let interval = self.interval?;
        let mut next = self.next_tick.lock();
        let due = (*next).max(Instant::now());
        *next = due + interval;
        Some(due)
    }

    fn render(&self, sequence: u64) -> Result<VideoFrame> {
        let offset = (sequence as u32).wrapping_mul(SCROLL_STEP) % self.resolution.width;
        let rgb = render_bars(self.resolution, offset);
        let width = self.resolution.width;

        let (data, format, stride) = match self.format {
            PixelFormat::Rgb24 => (rgb, PixelFormat::Rgb24, width * 3),
            PixelFormat::Yuyv => (rgb_to_yuyv(&rgb), PixelFormat::Yuyv, width * 2),
            PixelFormat::Grey => (rgb_to_grey(&rgb), PixelFormat::Grey, width),
            _ => {
                let Some(encoder) = self.jpeg.as_ref() else {
                    return Err(AppError::Internal("pattern encoder missing".to_string()));
                };
                let jpeg = encoder.lock().encode(&rgb, width * 3, sequence)?;
                return Ok(VideoFrame::new(jpeg, self.resolution, PixelFormat::Mjpeg, 0, sequence));
            }
        };

        Ok(VideoFrame::new(Bytes::from(data), self.resolution, format, stride, sequence))
    }
}

#[async_trait::async_trait]
impl FrameSource for TestPatternSource {
    fn name(&self) -> &str {
        "test-pattern"
    }

    async fn capture(&self) -> Result<VideoFrame> {
        if let Some(due) = self.schedule() {
            tokio::time::sleep_until(due).await;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = self.render(sequence)?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    }

    fn release(&self, frame: VideoFrame) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous.is_err() {
            warn!("Frame #{} released with no capture outstanding", frame.sequence);
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

fn render_bars(resolution: Resolution, offset: u32) -> Vec<u8> {
    let width = resolution.width;
    let row: Vec<u8> = (0..width)
        .flat_map(|x| {
            let bar = ((x + offset) % width) as usize * BARS.len() / width as usize;
            BARS[bar]
        })
        .collect();

    let mut frame = Vec::with_capacity(row.len() * resolution.height as usize);
    for _ in 0..resolution.height {
        frame.extend_from_slice(&row);
    }
    frame
}

/// BT.601 studio-range conversion
fn rgb_to_yuv(rgb: &[u8]) -> (u8, u8, u8) {
    let (r, g, b) = (rgb[0] as i32, rgb[1] as i32, rgb[2] as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (y.clamp(0, 255) as u8, u.clamp(0, 255) as u8, v.clamp(0, 255) as u8)
}

fn rgb_to_yuyv(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(6)
        .flat_map(|pair| {
            let (y0, u0, v0) = rgb_to_yuv(&pair[..3]);
            let (y1, u1, v1) = rgb_to_yuv(&pair[3..]);
            let u = ((u0 as u16 + u1 as u16) / 2) as u8;
            let v = ((v0 as u16 + v1 as u16) / 2) as u8;
            [y0, u, y1, v]
        })
        .collect()
}

fn rgb_to_grey(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3).map(|px| rgb_to_yuv(px).0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::frame::FrameEncoding;

    const RES: Resolution = Resolution {
        width: 64,
        height: 16,
    };

    #[tokio::test]
    async fn test_raw_formats_have_expected_size() {
        for format in [PixelFormat::Yuyv, PixelFormat::Rgb24, PixelFormat::Grey] {
            let source = TestPatternSource::new(RES, format, 0).unwrap();
            let frame = source.capture().await.unwrap();
            assert_eq!(frame.format, format);
            assert_eq!(frame.encoding(), FrameEncoding::Raw);
            assert_eq!(Some(frame.len()), format.frame_size(RES));
            source.release(frame);
            assert_eq!(source.in_flight(), 0);
        }
    }

    #[tokio::test]
    async fn test_mjpeg_output_is_jpeg() {
        let source = TestPatternSource::new(RES, PixelFormat::Mjpeg, 0).unwrap();
        let frame = source.capture().await.unwrap();
        assert!(frame.is_valid_jpeg());
        source.release(frame);
    }

    #[tokio::test]
    async fn test_sequence_advances_and_pattern_scrolls() {
        let source = TestPatternSource::new(RES, PixelFormat::Rgb24, 0).unwrap();
        let first = source.capture().await.unwrap();
        let second = source.capture().await.unwrap();
        assert_eq!(second.sequence, first.sequence + 1);
        assert_ne!(first.data(), second.data());
        assert_eq!(source.in_flight(), 2);
        source.release(first);
        source.release(second);
    }

    #[tokio::test]
    async fn test_frames_are_paced() {
        let source = TestPatternSource::new(RES, PixelFormat::Grey, 50).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            let frame = source.capture().await.unwrap();
            source.release(frame);
        }
        // First frame is immediate, the next two are 20ms apart
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_rejects_unsupported_format() {
        assert!(TestPatternSource::new(RES, PixelFormat::Nv12, 30).is_err());
        assert!(TestPatternSource::new(Resolution::new(63, 16), PixelFormat::Yuyv, 30).is_err());
    }

    #[test]
    fn test_odd_height_only_rejected_for_yuyv() {
        let odd = Resolution::new(64, 47);
        assert!(TestPatternSource::new(odd, PixelFormat::Yuyv, 30).is_err());
        assert!(TestPatternSource::new(odd, PixelFormat::Grey, 30).is_ok());
        assert!(TestPatternSource::new(Resolution::new(64, 48), PixelFormat::Yuyv, 30).is_ok());
    }

    #[test]
    fn test_white_bar_luma() {
        let (y, u, v) = rgb_to_yuv(&[191, 191, 191]);
        assert_eq!((u, v), (128, 128));
        assert!(y > 170 && y < 185);
    }
}

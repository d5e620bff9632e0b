//! V4L2 video capture implementation
//!
//! Provides async video capture using memory-mapped buffers. The blocking
//! dequeue runs on tokio's blocking pool; the device is opened eagerly so a
//! missing camera is reported at startup, and reopened on the next capture
//! after it was lost.

use bytes::Bytes;
use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Device;

use super::format::{PixelFormat, Resolution};
use super::frame::VideoFrame;
use super::source::FrameSource;
use crate::config::VideoConfig;
use crate::error::{AppError, Result};
use crate::utils::LogThrottler;

/// Default number of capture buffers
const DEFAULT_BUFFER_COUNT: u32 = 2;
/// Minimum valid frame size (bytes)
const MIN_FRAME_SIZE: usize = 128;
/// Undersized frames tolerated in a row before giving up on a capture
const MAX_SHORT_FRAMES: u32 = 5;

/// Video capturer configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Device path
    pub device_path: PathBuf,
    /// Desired resolution
    pub resolution: Resolution,
    /// Desired pixel format
    pub format: PixelFormat,
    /// Desired frame rate (0 = driver default)
    pub fps: u32,
    /// Number of capture buffers
    pub buffer_count: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/video0"),
            resolution: Resolution::VGA,
            format: PixelFormat::Mjpeg,
            fps: 30,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }
}

impl CaptureConfig {
    pub fn from_video_config(video: &VideoConfig) -> Self {
        Self {
            device_path: PathBuf::from(&video.device),
            resolution: video.resolution(),
            format: video.pixel_format(),
            fps: video.fps,
            buffer_count: video.buffer_count.max(1),
        }
    }
}

/// An open, streaming device together with the format the driver settled on
struct OpenStream {
    stream: MmapStream<'static>,
    // Kept alive for the lifetime of the buffers
    _device: Device,
    resolution: Resolution,
    format: PixelFormat,
    stride: u32,
}

impl OpenStream {
    fn open(config: &CaptureConfig) -> Result<Self> {
        // Retry logic for device busy errors
        const MAX_RETRIES: u32 = 5;
        const RETRY_DELAY_MS: u64 = 200;

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            match Self::try_open(config) {
                Ok(stream) => return Ok(stream),
                Err(e) if is_busy(&e) => {
                    warn!(
                        "Device busy on attempt {}/{}, retrying in {}ms...",
                        attempt + 1,
                        MAX_RETRIES,
                        RETRY_DELAY_MS
                    );
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                    last_error = Some(e);
                }
                Err(e) => {
                    return Err(AppError::VideoError(format!(
                        "Failed to open device {:?}: {}",
                        config.device_path, e
                    )))
                }
            }
        }

        Err(AppError::VideoError(format!(
            "Failed to open device {:?} after {} attempts: {}",
            config.device_path,
            MAX_RETRIES,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn try_open(config: &CaptureConfig) -> io::Result<Self> {
        let device = Device::with_path(&config.device_path)?;

        let mut fmt = device.format()?;
        fmt.width = config.resolution.width;
        fmt.height = config.resolution.height;
        fmt.fourcc = config.format.to_fourcc();
        let actual = device.set_format(&fmt)?;

        let format = PixelFormat::from_fourcc(actual.fourcc).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("driver selected unsupported pixel format {}", actual.fourcc),
            )
        })?;
        let resolution = Resolution::new(actual.width, actual.height);
        if resolution != config.resolution || format != config.format {
            warn!(
                "Requested {} {}, driver selected {} {}",
                config.resolution, config.format, resolution, format
            );
        }

        if config.fps > 0 {
            if let Err(e) = device.set_params(&Parameters::with_fps(config.fps)) {
                warn!("Failed to set {} fps on {:?}: {}", config.fps, config.device_path, e);
            }
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, config.buffer_count)?;

        info!(
            "Capture format: {} {} stride={} buffers={}",
            resolution, format, actual.stride, config.buffer_count
        );

        Ok(Self {
            stream,
            _device: device,
            resolution,
            format,
            stride: actual.stride,
        })
    }

    /// Dequeue the next usable frame, copying it out of the mapped buffer
    fn grab(&mut self, sequence: u64) -> io::Result<Option<VideoFrame>> {
        for _ in 0..MAX_SHORT_FRAMES {
            let (buf, meta) = self.stream.next()?;
            // Use actual bytes used, not buffer size
            let used = (meta.bytesused as usize).min(buf.len());
            if used < MIN_FRAME_SIZE {
                debug!("Dropping small frame: {} bytes", used);
                continue;
            }
            return Ok(Some(VideoFrame::new(
                Bytes::copy_from_slice(&buf[..used]),
                self.resolution,
                self.format,
                self.stride,
                sequence,
            )));
        }
        Ok(None)
    }
}

fn is_busy(err: &io::Error) -> bool {
    // EBUSY
    err.raw_os_error() == Some(16) || err.to_string().contains("busy")
}

/// Errors after which the device node has to be reopened
fn is_device_lost(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(5)      // EIO - I/O error (device removed)
            | Some(6)   // ENXIO - No such device or address
            | Some(19)  // ENODEV - No such device
            | Some(32)  // EPIPE - Broken pipe
            | Some(108) // ESHUTDOWN - Transport endpoint shutdown
    )
}

/// Frame source backed by a V4L2 capture device
pub struct V4l2Source {
    config: CaptureConfig,
    name: String,
    stream: Arc<Mutex<Option<OpenStream>>>,
    sequence: AtomicU64,
    in_flight: AtomicUsize,
    throttler: Arc<LogThrottler>,
}

impl V4l2Source {
    /// Open the device and start streaming
    pub fn open(config: CaptureConfig) -> Result<Self> {
        info!(
            "Starting capture on {:?} at {} {}",
            config.device_path, config.resolution, config.format
        );
        let stream = OpenStream::open(&config)?;

        Ok(Self {
            name: format!("v4l2:{}", config.device_path.display()),
            config,
            stream: Arc::new(Mutex::new(Some(stream))),
            sequence: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            throttler: Arc::new(LogThrottler::with_secs(5)),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        &self.name
    }

    async fn capture(&self) -> Result<VideoFrame> {
        let slot = self.stream.clone();
        let config = self.config.clone();
        let throttler = self.throttler.clone();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        let frame = tokio::task::spawn_blocking(move || {
            let mut slot = slot.lock();
            if slot.is_none() {
                info!("Reopening capture device {:?}", config.device_path);
                *slot = Some(OpenStream::open(&config)?);
                throttler.clear("capture");
                throttler.clear("short_frames");
            }
            let Some(stream) = slot.as_mut() else {
                return Err(AppError::Internal("capture stream missing".to_string()));
            };

            match stream.grab(sequence) {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => {
                    crate::warn_throttled!(
                        throttler,
                        "short_frames",
                        "{:?}: {} undersized frames in a row",
                        config.device_path,
                        MAX_SHORT_FRAMES
                    );
                    Err(AppError::VideoError(format!(
                        "No valid frame after {} attempts",
                        MAX_SHORT_FRAMES
                    )))
                }
                Err(e) if is_device_lost(&e) => {
                    let device = config.device_path.display().to_string();
                    error!("Video device lost: {} - {}", device, e);
                    *slot = None;
                    Err(AppError::VideoDeviceLost {
                        device,
                        reason: e.to_string(),
                    })
                }
                Err(e) => {
                    if let Some(suppressed) = throttler.check("capture") {
                        if suppressed > 0 {
                            error!("Capture error: {} (suppressed {} repeats)", e, suppressed);
                        } else {
                            error!("Capture error: {}", e);
                        }
                    }
                    Err(AppError::VideoError(format!("Capture failed: {}", e)))
                }
            }
        })
        .await
        .map_err(|e| AppError::VideoError(format!("Capture task failed: {}", e)))??;

        // Counted only once the frame actually reaches the caller
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    }

    fn release(&self, frame: VideoFrame) {
        // The mapped buffer was requeued when the frame was copied out;
        // only the bookkeeping remains.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_errnos() {
        for errno in [5, 6, 19, 32, 108] {
            assert!(is_device_lost(&io::Error::from_raw_os_error(errno)));
        }
        assert!(!is_device_lost(&io::Error::from_raw_os_error(11)));
        assert!(!is_device_lost(&io::Error::new(io::ErrorKind::TimedOut, "timeout")));
    }

    #[test]
    fn test_busy_detection() {
        assert!(is_busy(&io::Error::from_raw_os_error(16)));
        assert!(!is_busy(&io::Error::from_raw_os_error(2)));
    }

    #[test]
    fn test_config_from_video_config() {
        let video = VideoConfig {
            device: "/dev/video2".to_string(),
            format: "YUYV".to_string(),
            buffer_count: 0,
            ..Default::default()
        };
        let config = CaptureConfig::from_video_config(&video);
        assert_eq!(config.device_path, PathBuf::from("/dev/video2"));
        assert_eq!(config.format, PixelFormat::Yuyv);
        assert_eq!(config.resolution, Resolution::VGA);
        assert_eq!(config.buffer_count, 1);
    }

    #[test]
    fn test_open_missing_device_fails() {
        let config = CaptureConfig {
            device_path: PathBuf::from("/dev/camstream-does-not-exist"),
            ..Default::default()
        };
        assert!(V4l2Source::open(config).is_err());
    }
}

//! Frame source abstraction
//!
//! A frame source hands out one [`VideoFrame`] per `capture` call and expects
//! it back through `release`. [`FrameLease`] ties the two together so a
//! frame goes back to its source exactly once, whichever way the caller
//! leaves the scope.

use async_trait::async_trait;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, SourceKind};
use crate::error::{AppError, Result};
use crate::video::capture::{CaptureConfig, V4l2Source};
use crate::video::frame::VideoFrame;
use crate::video::pattern::TestPatternSource;

/// Producer of captured frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Wait for the next frame
    async fn capture(&self) -> Result<VideoFrame>;

    /// Give a captured frame back
    fn release(&self, frame: VideoFrame);

    /// Frames captured and not yet released
    fn in_flight(&self) -> usize;
}

/// A captured frame on loan from its source
///
/// Dropping the lease releases the frame.
pub struct FrameLease<'s> {
    source: &'s dyn FrameSource,
    frame: Option<VideoFrame>,
}

impl<'s> FrameLease<'s> {
    /// Capture a frame from `source`
    pub async fn capture(source: &'s dyn FrameSource) -> Result<FrameLease<'s>> {
        let frame = source.capture().await?;
        Ok(Self {
            source,
            frame: Some(frame),
        })
    }

    /// Capture, giving up after `timeout` when one is set
    pub async fn capture_within(
        source: &'s dyn FrameSource,
        timeout: Option<Duration>,
    ) -> Result<FrameLease<'s>> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, Self::capture(source))
                .await
                .map_err(|_| {
                    AppError::VideoError(format!(
                        "{}: no frame within {}ms",
                        source.name(),
                        limit.as_millis()
                    ))
                })?,
            None => Self::capture(source).await,
        }
    }

    /// Release explicitly (same as dropping)
    pub fn release(self) {}
}

impl Deref for FrameLease<'_> {
    type Target = VideoFrame;

    fn deref(&self) -> &VideoFrame {
        // Only `Drop` takes the frame out
        match &self.frame {
            Some(frame) => frame,
            None => unreachable!("frame lease used after release"),
        }
    }
}

impl Drop for FrameLease<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.source.release(frame);
        }
    }
}

/// Build the frame source selected in the configuration
pub fn open_source(config: &AppConfig) -> Result<Arc<dyn FrameSource>> {
    let video = &config.video;
    match video.source {
        SourceKind::V4l2 => {
            let capture = CaptureConfig::from_video_config(video);
            Ok(Arc::new(V4l2Source::open(capture)?))
        }
        SourceKind::TestPattern => Ok(Arc::new(TestPatternSource::new(
            video.resolution(),
            video.pixel_format(),
            video.fps,
        )?)),
    }
}

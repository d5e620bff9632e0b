//! Per-connection MJPEG stream loop
//!
//! A [`StreamSession`] moves through `Negotiating → Streaming → Closed`.
//! While streaming it repeats capture, encode, write and release with
//! exactly one frame in flight, until any step fails. Nothing is retried;
//! the client reconnecting starts a new session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::mjpeg::{frame_parts, STREAM_CONTENT_TYPE};
use super::sink::FrameSink;
use super::stats::{FpsCalculator, FrameTiming};
use crate::error::StreamError;
use crate::video::encoder::FrameEncoder;
use crate::video::source::{FrameLease, FrameSource};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Content type not yet set on the sink
    Negotiating,
    /// Frames are being sent
    Streaming,
    /// Terminal
    Closed,
}

/// What a finished session did and why it stopped
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: u64,
    pub frames_sent: u64,
    /// Payload bytes, framing excluded
    pub bytes_sent: u64,
    pub duration: Duration,
    pub reason: StreamError,
}

impl SessionSummary {
    pub fn average_fps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }
}

/// One client's stream
pub struct StreamSession<S> {
    id: u64,
    source: Arc<dyn FrameSource>,
    encoder: FrameEncoder,
    sink: S,
    state: SessionState,
    closed_by: Option<StreamError>,
    frame_timeout: Option<Duration>,
    timing: FrameTiming,
    fps: FpsCalculator,
    frames_sent: u64,
    bytes_sent: u64,
    started: Instant,
}

impl<S: FrameSink> StreamSession<S> {
    pub fn new(source: Arc<dyn FrameSource>, encoder: FrameEncoder, sink: S) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            source,
            encoder,
            sink,
            state: SessionState::Negotiating,
            closed_by: None,
            frame_timeout: None,
            timing: FrameTiming::new(),
            fps: FpsCalculator::new(),
            frames_sent: 0,
            bytes_sent: 0,
            started: Instant::now(),
        }
    }

    /// Bound how long a single capture may take
    pub fn with_frame_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.frame_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Announce the multipart content type on the sink
    pub fn negotiate(&mut self) -> Result<(), StreamError> {
        match self.state {
            SessionState::Negotiating => {}
            SessionState::Streaming => return Ok(()),
            SessionState::Closed => return Err(self.close_reason()),
        }
        match self.sink.set_content_type(STREAM_CONTENT_TYPE) {
            Ok(()) => {
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(e) => {
                self.close(e.clone());
                Err(e)
            }
        }
    }

    /// Stream until something fails
    pub async fn run(mut self) -> SessionSummary {
        if self.negotiate().is_ok() {
            debug!("Session {} streaming from {}", self.id, self.source.name());
            let reason = loop {
                if let Err(e) = self.send_next_frame().await {
                    break e;
                }
            };
            self.close(reason);
        }
        self.summary()
    }

    async fn send_next_frame(&mut self) -> Result<(), StreamError> {
        self.timing.start();

        let frame = FrameLease::capture_within(self.source.as_ref(), self.frame_timeout).await?;
        // On failure the lease drops here and the frame goes back to the source
        let encoded = self.encoder.encode(&frame)?;
        let payload_len = encoded.len();

        for part in frame_parts(&encoded) {
            self.sink.write_chunk(part).await?;
        }
        drop(encoded);
        let latency = frame.age();
        frame.release();

        self.frames_sent += 1;
        self.bytes_sent += payload_len as u64;
        self.fps.record_frame();
        let interval = self.timing.lap();
        trace!(
            "Session {}: frame {} bytes in {}ms, {}ms after capture ({:.1} fps)",
            self.id,
            payload_len,
            interval.as_millis(),
            latency.as_millis(),
            self.fps.current_fps()
        );
        Ok(())
    }

    fn close(&mut self, reason: StreamError) {
        self.state = SessionState::Closed;
        self.closed_by.get_or_insert(reason);
    }

    fn close_reason(&self) -> StreamError {
        self.closed_by
            .clone()
            .unwrap_or_else(|| StreamError::Sink("session closed".to_string()))
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            frames_sent: self.frames_sent,
            bytes_sent: self.bytes_sent,
            duration: self.started.elapsed(),
            reason: self.close_reason(),
        }
    }
}

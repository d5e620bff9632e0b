//! MJPEG streaming over HTTP
//!
//! - `mjpeg`: multipart framing
//! - `sink`: where a session writes
//! - `session`: the per-connection stream loop
//! - `stats`: frame timing

pub mod mjpeg;
pub mod session;
pub mod sink;
pub mod stats;

pub use mjpeg::{BOUNDARY, STREAM_CONTENT_TYPE};
pub use session::{SessionState, SessionSummary, StreamSession};
pub use sink::{ChannelSink, FrameSink};
pub use stats::{FpsCalculator, FrameTiming};

//! Video capture and JPEG encoding
//!
//! Frame sources (V4L2 devices or a generated test pattern) hand out
//! [`VideoFrame`]s; the encoder turns raw frames into JPEG.

pub mod capture;
pub mod convert;
pub mod encoder;
pub mod format;
pub mod frame;
pub mod pattern;
pub mod source;

pub use capture::{CaptureConfig, V4l2Source};
pub use convert::{PixelConverter, Yuv420pBuffer};
pub use encoder::{EncodedFrame, FrameEncoder, JpegEncoder};
pub use format::{PixelFormat, Resolution};
pub use frame::{FrameEncoding, VideoFrame};
pub use pattern::TestPatternSource;
pub use source::{open_source, FrameLease, FrameSource};

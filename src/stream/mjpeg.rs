//! multipart/x-mixed-replace framing
//!
//! Every JPEG goes out as three chunks: the boundary marker, the part
//! header carrying the exact payload length, then the payload itself.

use bytes::Bytes;

use crate::video::encoder::EncodedFrame;

macro_rules! boundary {
    () => {
        "123456789000000000000987654321"
    };
}

/// Multipart boundary token
pub const BOUNDARY: &str = boundary!();

/// Content type announced for `/stream`
pub const STREAM_CONTENT_TYPE: &str =
    concat!("multipart/x-mixed-replace;boundary=", boundary!());

const BOUNDARY_MARKER: &str = concat!("\r\n--", boundary!(), "\r\n");

/// Content type of every part
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// `\r\n--BOUNDARY\r\n`
pub fn boundary_marker() -> Bytes {
    Bytes::from_static(BOUNDARY_MARKER.as_bytes())
}

/// Part header for a payload of `len` bytes
pub fn part_header(len: usize) -> Bytes {
    Bytes::from(format!(
        "Content-Type: {}\r\nContent-Length: {}\r\n\r\n",
        PART_CONTENT_TYPE, len
    ))
}

/// The three chunks making up one part, in write order
///
/// The header length is taken from the payload actually being sent.
pub fn frame_parts(frame: &EncodedFrame<'_>) -> [Bytes; 3] {
    let payload = frame.to_bytes();
    [boundary_marker(), part_header(payload.len()), payload]
}

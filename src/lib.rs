//! camstream - MJPEG-over-HTTP camera streaming
//!
//! Serves a camera as a `multipart/x-mixed-replace` stream that any browser
//! can show in an `<img>` tag, along with a landing page and single-frame
//! snapshots.

pub mod config;
pub mod error;
pub mod state;
pub mod stream;
pub mod utils;
pub mod video;
pub mod web;

pub use error::{AppError, Result};

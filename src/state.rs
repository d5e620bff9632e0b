use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigStore;
use crate::video::encoder::FrameEncoder;
use crate::video::source::FrameSource;

/// Application-wide state shared across handlers
///
/// The frame source is the only thing sessions share; it serialises access
/// to the device itself. Everything else a session needs is created per
/// connection from the current configuration.
pub struct AppState {
    /// Configuration store
    pub config: ConfigStore,
    /// Camera (or test pattern) every session captures from
    pub source: Arc<dyn FrameSource>,
}

impl AppState {
    pub fn new(config: ConfigStore, source: Arc<dyn FrameSource>) -> Arc<Self> {
        Arc::new(Self { config, source })
    }

    /// Fresh encoder at the configured quality
    pub fn frame_encoder(&self) -> FrameEncoder {
        FrameEncoder::new(self.config.get().stream.jpeg_quality)
    }

    /// Per-frame capture deadline, if one is configured
    pub fn frame_timeout(&self) -> Option<Duration> {
        match self.config.get().stream.frame_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

//! Output side of a stream session

use async_trait::async_trait;
use axum::http::HeaderValue;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::StreamError;

/// A chunk-writable HTTP response
#[async_trait]
pub trait FrameSink: Send {
    /// Content type of the response; must be set before the first chunk
    fn set_content_type(&mut self, content_type: &str) -> Result<(), StreamError>;

    /// Send one chunk of the body, waiting until the client can take it
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StreamError>;
}

/// Sink feeding a streamed axum body through a single-slot channel
///
/// A slow client therefore holds the session back instead of letting frames
/// pile up in memory. Once the receiving body is dropped every write fails.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    content_type: Option<HeaderValue>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                tx,
                content_type: None,
            },
            rx,
        )
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    fn set_content_type(&mut self, content_type: &str) -> Result<(), StreamError> {
        let value = HeaderValue::from_str(content_type)
            .map_err(|e| StreamError::Sink(format!("invalid content type: {}", e)))?;
        self.content_type = Some(value);
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StreamError> {
        if self.content_type.is_none() {
            return Err(StreamError::Sink("content type not negotiated".to_string()));
        }
        self.tx
            .send(chunk)
            .await
            .map_err(|_| StreamError::Sink("client disconnected".to_string()))
    }
}

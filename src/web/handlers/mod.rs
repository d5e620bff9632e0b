use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream::{ChannelSink, SessionSummary, StreamSession};
use crate::video::source::FrameLease;

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// MJPEG Streaming
// ============================================================================

/// MJPEG stream endpoint
///
/// Each connection gets its own [`StreamSession`] running on a spawned task.
/// Chunks reach the client through a single-slot channel, so the session
/// only captures the next frame once the previous one has been taken.
pub async fn mjpeg_stream(State(state): State<Arc<AppState>>) -> Response {
    let (sink, mut rx) = ChannelSink::channel();
    let mut session = StreamSession::new(state.source.clone(), state.frame_encoder(), sink)
        .with_frame_timeout(state.frame_timeout());

    if let Err(e) = session.negotiate() {
        return AppError::Internal(format!("Stream negotiation failed: {}", e)).into_response();
    }
    let Some(content_type) = session.sink().content_type().cloned() else {
        return AppError::Internal("Stream content type missing".to_string()).into_response();
    };

    debug!("Stream session {} opened", session.id());
    tokio::spawn(async move {
        let summary = session.run().await;
        log_session_end(&summary);
    });

    // Dropping this stream (client gone) closes the channel and ends the session
    let body_stream = async_stream::stream! {
        while let Some(data) = rx.recv().await {
            yield Ok::<Bytes, std::io::Error>(data);
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            ),
            (header::PRAGMA, HeaderValue::from_static("no-cache")),
            (header::EXPIRES, HeaderValue::from_static("0")),
        ],
        Body::from_stream(body_stream),
    )
        .into_response()
}

fn log_session_end(summary: &SessionSummary) {
    if summary.reason.is_disconnect() {
        info!(
            "Stream session {} closed: {} frames, {} bytes in {:.1}s ({:.1} fps)",
            summary.id,
            summary.frames_sent,
            summary.bytes_sent,
            summary.duration.as_secs_f64(),
            summary.average_fps()
        );
    } else {
        error!(
            "Stream session {} ended after {} frames: {}",
            summary.id, summary.frames_sent, summary.reason
        );
    }
}

/// Single JPEG snapshot
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Result<Response> {
    let frame = FrameLease::capture_within(state.source.as_ref(), state.frame_timeout()).await?;

    let mut encoder = state.frame_encoder();
    let jpeg = encoder
        .encode(&frame)
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?
        .to_bytes();
    frame.release();

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        jpeg,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ConfigStore};
    use crate::stream::mjpeg::{boundary_marker, part_header};
    use crate::video::format::{PixelFormat, Resolution};
    use crate::video::frame::{is_valid_jpeg, VideoFrame};
    use crate::video::pattern::TestPatternSource;
    use crate::video::source::FrameSource;
    use futures::StreamExt;

    fn pattern_state(format: PixelFormat) -> Arc<AppState> {
        let source = TestPatternSource::new(Resolution::new(64, 48), format, 0).unwrap();
        AppState::new(ConfigStore::in_memory(AppConfig::default()), Arc::new(source))
    }

    struct BrokenSource;

    #[async_trait::async_trait]
    impl FrameSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn capture(&self) -> crate::error::Result<VideoFrame> {
            Err(AppError::VideoDeviceLost {
                device: "/dev/video0".to_string(),
                reason: "No such device".to_string(),
            })
        }

        fn release(&self, _frame: VideoFrame) {}

        fn in_flight(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let Json(health) = health_check().await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_stream_headers_and_first_part() {
        let state = pattern_state(PixelFormat::Yuyv);
        let response = mjpeg_stream(State(state.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "multipart/x-mixed-replace;boundary=123456789000000000000987654321"
        );
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");

        let mut body = response.into_body().into_data_stream();
        let marker = body.next().await.unwrap().unwrap();
        let header_part = body.next().await.unwrap().unwrap();
        let payload = body.next().await.unwrap().unwrap();

        assert_eq!(marker, boundary_marker());
        assert_eq!(header_part, part_header(payload.len()));
        assert!(is_valid_jpeg(&payload));

        // Client goes away; the session notices on its next write
        drop(body);
        for _ in 0..50 {
            if state.source.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(state.source.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_returns_jpeg() {
        let state = pattern_state(PixelFormat::Mjpeg);
        let response = snapshot(State(state.clone())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(is_valid_jpeg(&body));
        assert_eq!(state.source.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_unavailable_when_capture_fails() {
        let state = AppState::new(
            ConfigStore::in_memory(AppConfig::default()),
            Arc::new(BrokenSource),
        );
        let response = snapshot(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

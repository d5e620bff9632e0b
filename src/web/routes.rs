use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::static_files::index_handler;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(handlers::mjpeg_stream))
        .route("/snapshot", get(handlers::snapshot))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ConfigStore};
    use crate::video::format::{PixelFormat, Resolution};
    use crate::video::pattern::TestPatternSource;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn serve() -> std::net::SocketAddr {
        let source = TestPatternSource::new(Resolution::new(32, 16), PixelFormat::Mjpeg, 0).unwrap();
        let state = AppState::new(ConfigStore::in_memory(AppConfig::default()), Arc::new(source));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        addr
    }

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn test_routes() {
        let addr = serve().await;

        let index = get(addr, "/").await;
        assert!(index.starts_with("HTTP/1.1 200"));
        assert!(index.contains("text/html; charset=utf-8"));
        assert!(index.contains(r#"<img src="/stream""#));

        let health = get(addr, "/health").await;
        assert!(health.contains(r#""status":"ok""#));

        let snapshot = get(addr, "/snapshot").await;
        assert!(snapshot.starts_with("HTTP/1.1 200"));
        assert!(snapshot.contains("content-type: image/jpeg"));

        let missing = get(addr, "/missing").await;
        assert!(missing.starts_with("HTTP/1.1 404"));
    }
}

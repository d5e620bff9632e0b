use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;

use super::AppConfig;
use crate::error::{AppError, Result};

/// Configuration store backed by a TOML file
///
/// Uses `ArcSwap` for lock-free reads, so handlers can read the
/// configuration on every request without contention.
#[derive(Clone)]
pub struct ConfigStore {
    cache: Arc<ArcSwap<AppConfig>>,
}

impl ConfigStore {
    /// Load configuration from `path`
    ///
    /// A missing file is not an error: defaults are used.
    pub async fn load(path: &Path) -> Result<Self> {
        let config = match tokio::fs::read_to_string(path).await {
            Ok(text) => toml::from_str::<AppConfig>(&text).map_err(|e| {
                AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                AppConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            cache: Arc::new(ArcSwap::from_pointee(config)),
        })
    }

    /// Store with no backing file
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            cache: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Get current configuration (lock-free, zero-copy)
    pub fn get(&self) -> Arc<AppConfig> {
        self.cache.load_full()
    }

    /// Update configuration with a closure
    ///
    /// Only the cached copy changes; the file is never rewritten.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let current = self.cache.load();
        let mut config = (**current).clone();
        f(&mut config);
        self.cache.store(Arc::new(config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::load(&dir.path().join("absent.toml"))
            .await
            .unwrap();

        assert_eq!(*store.get(), AppConfig::default());
    }

    #[tokio::test]
    async fn test_file_values_and_update() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("camstream.toml");
        std::fs::write(&path, "[web]\nhttp_port = 9000\n").unwrap();

        let store = ConfigStore::load(&path).await.unwrap();
        assert_eq!(store.get().web.http_port, 9000);
        assert_eq!(store.get().web.bind_address, "0.0.0.0");

        let before = store.get();
        store.update(|c| c.video.source = SourceKind::TestPattern);
        assert_eq!(store.get().video.source, SourceKind::TestPattern);
        // Readers holding the old snapshot are unaffected
        assert_eq!(before.video.source, SourceKind::V4l2);
        // The file itself is untouched
        let reloaded = ConfigStore::load(&path).await.unwrap();
        assert_eq!(reloaded.get().video.source, SourceKind::V4l2);
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[web]\nhttp_port = \"eighty\"\n").unwrap();

        let err = ConfigStore::load(&path).await.err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}

// Concrete capability backends and the transfer fallback chain

pub mod ffmpeg;
pub mod http;
pub mod ytdlp;

pub use ffmpeg::FfmpegTranscoder;
pub use http::HttpTransfer;
pub use ytdlp::{YtDlpCatalog, YtDlpTransfer};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::errors::DownloadError;
use super::models::{RemoteItem, StreamVariant};
use super::traits::Transfer;

/// Tries each backend in order and returns the first success
#[derive(Default)]
pub struct FallbackTransfer {
    backends: Vec<Arc<dyn Transfer>>,
}

impl FallbackTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_backend(&mut self, backend: Arc<dyn Transfer>) {
        self.backends.push(backend);
    }

    pub fn with_backend(mut self, backend: Arc<dyn Transfer>) -> Self {
        self.add_backend(backend);
        self
    }
}

#[async_trait]
impl Transfer for FallbackTransfer {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn transfer(
        &self,
        item: &RemoteItem,
        variant: &StreamVariant,
        target: &Path,
    ) -> Result<u64, DownloadError> {
        let mut last_error = None;

        for backend in &self.backends {
            debug!(backend = backend.name(), title = %item.title, "Trying transfer backend");
            match backend.transfer(item, variant, target).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    warn!(backend = backend.name(), title = %item.title, error = %e, "Transfer backend failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DownloadError::Unknown("No transfer backends configured".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{audio_variant, item, FakeTransfer};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_falls_through_to_next_backend() {
        let dir = tempdir().unwrap();
        let broken = Arc::new(FakeTransfer::default().with_failure("a"));
        let working = Arc::new(FakeTransfer::default());
        let chain = FallbackTransfer::new()
            .with_backend(broken.clone())
            .with_backend(working.clone());

        let target = dir.path().join("song.m4a");
        chain.transfer(&item("a", "Song"), &audio_variant(128), &target).await.unwrap();

        assert_eq!(broken.calls(), 1);
        assert_eq!(working.calls(), 1);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a:a128");
    }

    #[tokio::test]
    async fn test_last_error_is_reported() {
        let dir = tempdir().unwrap();
        let chain = FallbackTransfer::new().with_backend(Arc::new(FakeTransfer::default().with_failure("a")));

        let err = chain
            .transfer(&item("a", "Song"), &audio_variant(128), &dir.path().join("song.m4a"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Transfer(_)));
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let dir = tempdir().unwrap();
        let err = FallbackTransfer::new()
            .transfer(&item("a", "Song"), &audio_variant(128), &dir.path().join("song.m4a"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Unknown(_)));
    }
}

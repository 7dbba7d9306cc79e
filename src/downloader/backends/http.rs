// Direct HTTP transfer of a variant URL

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::debug;

use crate::downloader::errors::DownloadError;
use crate::downloader::materializer::part_path;
use crate::downloader::models::{FetchConfig, RemoteItem, StreamVariant};
use crate::downloader::traits::Transfer;

/// Streams a variant's direct URL to disk.
///
/// There is no overall deadline: a transfer fails only when the server sends
/// nothing for `idle_timeout`, so slow but steady downloads complete.
pub struct HttpTransfer {
    client: reqwest::Client,
    idle_timeout: Duration,
}

impl HttpTransfer {
    pub fn new(config: &FetchConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30));

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| DownloadError::InvalidConfig(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            idle_timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    async fn stream_to(&self, url: &str, part: &Path) -> Result<u64, DownloadError> {
        let mut response = timeout(self.idle_timeout, self.client.get(url).send())
            .await
            .map_err(|_| DownloadError::NetworkTimeout)?
            .and_then(|r| r.error_for_status())
            .map_err(classify_error)?;

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| DownloadError::fs(part, e))?;

        let mut written = 0u64;
        loop {
            let chunk = timeout(self.idle_timeout, response.chunk())
                .await
                .map_err(|_| DownloadError::NetworkTimeout)?
                .map_err(classify_error)?;
            let Some(chunk) = chunk else { break };

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::fs(part, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| DownloadError::fs(part, e))?;
        Ok(written)
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn transfer(
        &self,
        item: &RemoteItem,
        variant: &StreamVariant,
        target: &Path,
    ) -> Result<u64, DownloadError> {
        let url = variant.url.as_deref().ok_or_else(|| {
            DownloadError::Transfer(format!("variant {} of \"{}\" has no direct URL", variant.id, item.title))
        })?;

        let part = part_path(target);
        let written = match self.stream_to(url, &part).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, target)
            .await
            .map_err(|e| DownloadError::fs(target, e))?;

        debug!(title = %item.title, bytes = written, "HTTP transfer complete");
        Ok(written)
    }
}

fn classify_error(e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        return DownloadError::NetworkTimeout;
    }
    match e.status().map(|s| s.as_u16()) {
        Some(403) | Some(429) => DownloadError::Blocked(e.to_string()),
        Some(404) | Some(410) => DownloadError::NotFound(e.to_string()),
        _ => DownloadError::Transfer(e.to_string()),
    }
}

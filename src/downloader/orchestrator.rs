// Orchestrator - the outward entry points, wiring backends into the pipeline

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::backends::{FallbackTransfer, FfmpegTranscoder, HttpTransfer, YtDlpCatalog, YtDlpTransfer};
use super::collection::{self, Classification};
use super::errors::DownloadError;
use super::models::{FetchConfig, FetchResult, Mode, Outcome, RemoteItem};
use super::pipeline::Pipeline;
use super::resolver;
use super::tools::{ToolInfo, ToolManager};
use super::traits::Capabilities;

pub struct Downloader {
    caps: Capabilities,
    config: FetchConfig,
}

impl Downloader {
    /// Downloader backed by yt-dlp, direct HTTP and ffmpeg.
    ///
    /// Transfers try the variant's direct URL first and fall back to yt-dlp.
    pub fn new(config: FetchConfig) -> Result<Self, DownloadError> {
        config.validate()?;

        let transfer = FallbackTransfer::new()
            .with_backend(Arc::new(HttpTransfer::new(&config)?))
            .with_backend(Arc::new(YtDlpTransfer::new(&config)));
        let caps = Capabilities::new(
            Arc::new(YtDlpCatalog::new(&config)),
            Arc::new(transfer),
            Arc::new(FfmpegTranscoder::new(&config)),
        );

        Ok(Self::with_capabilities(caps, config))
    }

    pub fn with_capabilities(caps: Capabilities, config: FetchConfig) -> Self {
        Self { caps, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn destination(&self, destination: Option<&Path>) -> PathBuf {
        destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.output_dir.clone())
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.caps.clone(), &self.config)
    }

    /// Fetch one item (URL or search text) and return its final path
    pub async fn fetch(
        &self,
        input: &str,
        mode: Mode,
        destination: Option<&Path>,
    ) -> Result<PathBuf, DownloadError> {
        let destination = self.destination(destination);
        let item = resolver::resolve(self.caps.catalog.as_ref(), input).await?;
        info!(title = %item.title, %mode, "Fetching single item");
        self.pipeline().run_single(item, mode, &destination).await
    }

    /// Fetch every member of a collection; a non-collection input is a
    /// one-item run.
    pub async fn fetch_collection(
        &self,
        input: &str,
        mode: Mode,
        destination: Option<&Path>,
        concurrency_limit: Option<usize>,
    ) -> Result<Vec<Outcome>, DownloadError> {
        self.fetch_collection_with_cancel(input, mode, destination, concurrency_limit, CancellationToken::new())
            .await
    }

    pub async fn fetch_collection_with_cancel(
        &self,
        input: &str,
        mode: Mode,
        destination: Option<&Path>,
        concurrency_limit: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<Vec<Outcome>, DownloadError> {
        let members = self.members(input).await?;
        self.run_members(members, mode, destination, concurrency_limit, cancel).await
    }

    /// Classify `input` and route it to the single or collection path
    pub async fn download(&self, input: &str, mode: Mode) -> Result<FetchResult, DownloadError> {
        self.download_with_cancel(input, mode, CancellationToken::new()).await
    }

    pub async fn download_with_cancel(
        &self,
        input: &str,
        mode: Mode,
        cancel: CancellationToken,
    ) -> Result<FetchResult, DownloadError> {
        match collection::classify(self.caps.catalog.as_ref(), input).await {
            Classification::Collection(members) => {
                let outcomes = self.run_members(members, mode, None, None, cancel).await?;
                Ok(FetchResult::Collection(outcomes))
            }
            Classification::SingleItem | Classification::Ambiguous(_) => {
                Ok(FetchResult::Single(self.fetch(input, mode, None).await?))
            }
        }
    }

    pub async fn download_audio(&self, input: &str) -> Result<FetchResult, DownloadError> {
        self.download(input, Mode::Audio).await
    }

    pub async fn download_video(&self, input: &str) -> Result<FetchResult, DownloadError> {
        self.download(input, Mode::Video).await
    }

    pub async fn tool_status(&self) -> Vec<ToolInfo> {
        ToolManager::from_config(&self.config).get_all_tools().await
    }

    async fn members(&self, input: &str) -> Result<Vec<RemoteItem>, DownloadError> {
        let catalog = self.caps.catalog.as_ref();
        match collection::classify(catalog, input).await {
            Classification::Collection(members) => Ok(members),
            Classification::SingleItem | Classification::Ambiguous(_) => {
                Ok(vec![resolver::resolve(catalog, input).await?])
            }
        }
    }

    async fn run_members(
        &self,
        members: Vec<RemoteItem>,
        mode: Mode,
        destination: Option<&Path>,
        concurrency_limit: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<Vec<Outcome>, DownloadError> {
        let destination = self.destination(destination);
        let limit = concurrency_limit.unwrap_or(self.config.concurrency);
        self.pipeline().run(members, mode, &destination, limit, cancel).await
    }
}

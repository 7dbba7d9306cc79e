// yt-dlp backed catalog and transfer
//
// Catalog calls go through `--dump-json` / `--dump-single-json`; transfers ask
// yt-dlp for one exact format id.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::materializer::part_path;
use crate::downloader::models::{FetchConfig, RemoteItem, StreamVariant, VariantKind};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::traits::{CollectionLookup, MediaCatalog, Transfer};
use crate::downloader::utils::{failure_message, get_proxy_args, get_timeout_args, run_output_with_timeout};

/// Invocation settings shared by the catalog and the transfer
#[derive(Debug, Clone)]
struct YtDlpCommand {
    program: String,
    /// Passed as `--socket-timeout`
    timeout_seconds: u64,
    /// Kill the process after this long
    deadline_seconds: u64,
    proxy: Option<String>,
}

impl YtDlpCommand {
    fn from_config(config: &FetchConfig) -> Self {
        Self {
            program: ToolManager::from_config(config).program(ToolType::YtDlp),
            timeout_seconds: config.timeout_seconds,
            deadline_seconds: config.timeout_seconds,
            proxy: config.proxy.clone(),
        }
    }

    fn with_deadline(mut self, seconds: u64) -> Self {
        self.deadline_seconds = seconds;
        self
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--ignore-config".to_string()];
        args.extend(get_timeout_args(self.timeout_seconds));
        args.extend(get_proxy_args(self.proxy.as_deref()));
        args
    }

    /// Run with `extra` appended to the base arguments and return stdout
    async fn run(&self, extra: Vec<String>) -> Result<Vec<u8>, DownloadError> {
        let mut args = self.base_args();
        args.extend(extra);

        let output = run_output_with_timeout(&self.program, args, self.deadline_seconds).await?;
        if !output.status.success() {
            return Err(failure_message(&output, &self.program).into());
        }
        Ok(output.stdout)
    }
}

pub struct YtDlpCatalog {
    command: YtDlpCommand,
    search_results: usize,
}

impl YtDlpCatalog {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            command: YtDlpCommand::from_config(config),
            search_results: config.search_results.max(1),
        }
    }
}

#[async_trait]
impl MediaCatalog for YtDlpCatalog {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn search(&self, query: &str) -> Result<Vec<RemoteItem>, DownloadError> {
        let stdout = self
            .command
            .run(vec![
                "--flat-playlist".to_string(),
                "--dump-single-json".to_string(),
                format!("ytsearch{}:{}", self.search_results, query),
            ])
            .await?;

        let json = parse_json(&stdout)?;
        let results = parse_entries(&json);
        debug!(query, results = results.len(), "Search finished");
        Ok(results)
    }

    async fn resolve_locator(&self, url: &str) -> Result<RemoteItem, DownloadError> {
        let stdout = self
            .command
            .run(vec![
                "--dump-json".to_string(),
                "--no-playlist".to_string(),
                url.to_string(),
            ])
            .await?;

        let item = parse_item(&parse_json(&stdout)?, url)?;
        debug!(title = %item.title, variants = item.variants.len(), "Resolved");
        Ok(item)
    }

    async fn lookup_collection(&self, locator: &str) -> Result<CollectionLookup, DownloadError> {
        let stdout = self
            .command
            .run(vec![
                "--flat-playlist".to_string(),
                "--dump-single-json".to_string(),
                locator.to_string(),
            ])
            .await?;

        Ok(parse_collection(&parse_json(&stdout)?))
    }
}

pub struct YtDlpTransfer {
    command: YtDlpCommand,
}

impl YtDlpTransfer {
    /// A transfer of a large file legitimately outlives `timeout_seconds`;
    /// yt-dlp's socket timeout catches stalls instead.
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            command: YtDlpCommand::from_config(config).with_deadline(config.transfer_deadline_seconds),
        }
    }
}

#[async_trait]
impl Transfer for YtDlpTransfer {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn transfer(
        &self,
        item: &RemoteItem,
        variant: &StreamVariant,
        target: &Path,
    ) -> Result<u64, DownloadError> {
        let part = part_path(target);
        let args = vec![
            "-f".to_string(),
            variant.id.clone(),
            "--no-playlist".to_string(),
            "--no-part".to_string(),
            "--force-overwrites".to_string(),
            "-o".to_string(),
            // -o is an output template; literal % must be doubled
            part.to_string_lossy().replace('%', "%%"),
            item.locator.clone(),
        ];

        if let Err(e) = self.command.run(args).await {
            warn!(title = %item.title, format = %variant.id, error = %e, "yt-dlp transfer failed");
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }

        let bytes = tokio::fs::metadata(&part)
            .await
            .map_err(|e| DownloadError::fs(&part, e))?
            .len();
        tokio::fs::rename(&part, target)
            .await
            .map_err(|e| DownloadError::fs(target, e))?;

        info!(title = %item.title, format = %variant.id, bytes, "yt-dlp transfer complete");
        Ok(bytes)
    }
}

fn parse_json(stdout: &[u8]) -> Result<Value, DownloadError> {
    let json_str = String::from_utf8_lossy(stdout);
    serde_json::from_str(&json_str).map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))
}

/// Fully resolved item from a `--dump-json` document
fn parse_item(json: &Value, requested: &str) -> Result<RemoteItem, DownloadError> {
    let formats = json["formats"]
        .as_array()
        .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

    let id = json["id"].as_str().unwrap_or("unknown").to_string();
    let locator = json["webpage_url"]
        .as_str()
        .or_else(|| json["original_url"].as_str())
        .unwrap_or(requested)
        .to_string();

    Ok(RemoteItem {
        title: json["title"].as_str().unwrap_or(&id).to_string(),
        variants: formats.iter().filter_map(parse_variant).collect(),
        id,
        locator,
    })
}

/// Muxed formats are video variants, audio-only formats audio variants;
/// video-only and storyboard formats are dropped.
fn parse_variant(f: &Value) -> Option<StreamVariant> {
    let vcodec = f["vcodec"].as_str().filter(|c| *c != "none");
    let acodec = f["acodec"].as_str().filter(|c| *c != "none");
    let height = f["height"].as_u64().map(|h| h as u32);

    let (kind, quality, codec) = match (vcodec, acodec) {
        (Some(v), Some(_)) => (VariantKind::Video, height.unwrap_or(0), Some(v)),
        (None, Some(a)) => {
            let bitrate = f["abr"].as_f64().or_else(|| f["tbr"].as_f64()).unwrap_or(0.0);
            (VariantKind::Audio, bitrate.round() as u32, Some(a))
        }
        // Codecs unreported: a sized rendition is taken as muxed
        _ if f["vcodec"].is_null() && f["acodec"].is_null() && height.is_some() => {
            (VariantKind::Video, height.unwrap_or(0), None)
        }
        _ => return None,
    };

    Some(StreamVariant {
        id: f["format_id"].as_str()?.to_string(),
        kind,
        quality,
        ext: f["ext"].as_str().unwrap_or("").to_string(),
        url: f["url"].as_str().map(|s| s.to_string()),
        codec: codec.map(|c| c.to_string()),
        filesize: f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64()),
    })
}

fn parse_collection(json: &Value) -> CollectionLookup {
    let is_playlist = json["_type"].as_str() == Some("playlist");
    match json["entries"].as_array() {
        Some(_) if is_playlist => CollectionLookup::Members(parse_entries(json)),
        _ => CollectionLookup::NotCollection,
    }
}

/// Flat entries of a playlist or search document, in listing order
fn parse_entries(json: &Value) -> Vec<RemoteItem> {
    json["entries"]
        .as_array()
        .map(|entries| entries.iter().filter_map(normalize_entry).collect())
        .unwrap_or_default()
}

fn normalize_entry(entry: &Value) -> Option<RemoteItem> {
    let id = entry["id"].as_str().filter(|s| !s.is_empty());

    // Prefer webpage_url; flat entries often only carry a bare id
    let locator = entry["webpage_url"]
        .as_str()
        .or_else(|| entry["url"].as_str().filter(|u| u.starts_with("http")))
        .map(|u| u.to_string())
        .or_else(|| id.map(|id| format!("https://www.youtube.com/watch?v={}", id)))?;

    let id = id.map(|s| s.to_string()).unwrap_or_else(|| locator.clone());
    let title = entry["title"]
        .as_str()
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.to_string())
        .unwrap_or_else(|| id.clone());

    Some(RemoteItem {
        id,
        title,
        locator,
        variants: Vec::new(),
    })
}

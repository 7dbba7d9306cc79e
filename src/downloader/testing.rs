// In-process fakes of every capability, shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{AudioFormat, RemoteItem, StreamVariant, VariantKind};
use super::traits::{Capabilities, CollectionLookup, MediaCatalog, Transcoder, Transfer};

pub fn audio_variant(quality: u32) -> StreamVariant {
    StreamVariant {
        id: format!("a{}", quality),
        kind: VariantKind::Audio,
        quality,
        ext: "m4a".to_string(),
        url: None,
        codec: Some("mp4a.40.2".to_string()),
        filesize: None,
    }
}

pub fn video_variant(height: u32) -> StreamVariant {
    StreamVariant {
        id: format!("v{}", height),
        kind: VariantKind::Video,
        quality: height,
        ext: "mp4".to_string(),
        url: None,
        codec: Some("avc1.4d401f".to_string()),
        filesize: None,
    }
}

pub fn item(id: &str, title: &str) -> RemoteItem {
    RemoteItem {
        id: id.to_string(),
        title: title.to_string(),
        locator: format!("https://media.test/watch?v={}", id),
        variants: vec![video_variant(360), audio_variant(128), video_variant(720)],
    }
}

/// Item whose only rendition is video
pub fn video_only_item(id: &str, title: &str) -> RemoteItem {
    RemoteItem {
        variants: vec![video_variant(480)],
        ..item(id, title)
    }
}

/// Flat collection entry that still needs resolving
pub fn unresolved(resolved: &RemoteItem) -> RemoteItem {
    RemoteItem {
        variants: Vec::new(),
        ..resolved.clone()
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub items: HashMap<String, RemoteItem>,
    pub searches: HashMap<String, Vec<RemoteItem>>,
    pub collections: HashMap<String, Result<CollectionLookup, DownloadError>>,
    pub search_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_item(mut self, item: RemoteItem) -> Self {
        self.items.insert(item.locator.clone(), item);
        self
    }

    pub fn with_search(mut self, query: &str, results: Vec<RemoteItem>) -> Self {
        for result in &results {
            if result.is_resolved() {
                self.items.insert(result.locator.clone(), result.clone());
            }
        }
        self.searches.insert(query.to_string(), results);
        self
    }

    pub fn with_collection(mut self, locator: &str, members: Vec<RemoteItem>) -> Self {
        self.collections
            .insert(locator.to_string(), Ok(CollectionLookup::Members(members)));
        self
    }

    pub fn with_collection_error(mut self, locator: &str, error: DownloadError) -> Self {
        self.collections.insert(locator.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl MediaCatalog for FakeCatalog {
    fn name(&self) -> &'static str {
        "fake-catalog"
    }

    async fn search(&self, query: &str) -> Result<Vec<RemoteItem>, DownloadError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }

    async fn resolve_locator(&self, url: &str) -> Result<RemoteItem, DownloadError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.items
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::NotFound(url.to_string()))
    }

    async fn lookup_collection(&self, locator: &str) -> Result<CollectionLookup, DownloadError> {
        self.collections
            .get(locator)
            .cloned()
            .unwrap_or(Ok(CollectionLookup::NotCollection))
    }
}

/// Writes `<item id>:<variant id>` to the target after an optional delay
#[derive(Default)]
pub struct FakeTransfer {
    pub delays: HashMap<String, Duration>,
    pub failing: HashSet<String>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub completed: Mutex<Vec<String>>,
}

impl FakeTransfer {
    pub fn with_delay(mut self, item_id: &str, delay: Duration) -> Self {
        self.delays.insert(item_id.to_string(), delay);
        self
    }

    pub fn with_failure(mut self, item_id: &str) -> Self {
        self.failing.insert(item_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transfer for FakeTransfer {
    fn name(&self) -> &'static str {
        "fake-transfer"
    }

    async fn transfer(
        &self,
        item: &RemoteItem,
        variant: &StreamVariant,
        target: &Path,
    ) -> Result<u64, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&item.id) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let result = if self.failing.contains(&item.id) {
            Err(DownloadError::Transfer(format!("simulated failure for {}", item.id)))
        } else {
            let body = format!("{}:{}", item.id, variant.id);
            let part = target.with_extension(format!("{}.part", variant.ext));
            tokio::fs::write(&part, body.as_bytes())
                .await
                .map_err(|e| DownloadError::fs(&part, e))?;
            tokio::fs::rename(&part, target)
                .await
                .map_err(|e| DownloadError::fs(target, e))?;
            Ok(body.len() as u64)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if result.is_ok() {
            if let Ok(mut done) = self.completed.lock() {
                done.push(item.id.clone());
            }
        }
        result
    }
}

/// Copies the input into the output. Inputs whose content starts with
/// `silent` have no audio track; inputs starting with `broken` fail after
/// leaving a partial output behind.
#[derive(Default)]
pub struct FakeTranscoder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn name(&self) -> &'static str {
        "fake-transcoder"
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = tokio::fs::read_to_string(input)
            .await
            .map_err(|e| DownloadError::fs(input, e))?;

        if content.starts_with("silent") {
            return Err(DownloadError::NoAudioTrack(input.to_path_buf()));
        }
        if content.starts_with("broken") {
            tokio::fs::write(output, b"half")
                .await
                .map_err(|e| DownloadError::fs(output, e))?;
            return Err(DownloadError::ExecutionError("encoder crashed".to_string()));
        }

        let encoded = format!("{}|{}", format.extension(), content);
        tokio::fs::write(output, encoded.as_bytes())
            .await
            .map_err(|e| DownloadError::fs(output, e))
    }
}

pub fn capabilities(
    catalog: FakeCatalog,
    transfer: FakeTransfer,
) -> (Capabilities, Arc<FakeCatalog>, Arc<FakeTransfer>, Arc<FakeTranscoder>) {
    let catalog = Arc::new(catalog);
    let transfer = Arc::new(transfer);
    let transcoder = Arc::new(FakeTranscoder::default());
    let caps = Capabilities::new(catalog.clone(), transfer.clone(), transcoder.clone());
    (caps, catalog, transfer, transcoder)
}

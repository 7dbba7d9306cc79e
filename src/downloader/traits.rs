// Capability traits the pipeline is built on

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{AudioFormat, RemoteItem, StreamVariant};

/// Answer of a collection lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionLookup {
    /// Ordered member list (possibly unresolved entries)
    Members(Vec<RemoteItem>),
    /// Locator points at a single item
    NotCollection,
}

/// Search, locator resolution and collection listing
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Name of the catalog (for logging)
    fn name(&self) -> &'static str;

    /// Free-text search, best match first. May return an empty list.
    async fn search(&self, query: &str) -> Result<Vec<RemoteItem>, DownloadError>;

    /// Resolve a page URL into a fully resolved item
    async fn resolve_locator(&self, url: &str) -> Result<RemoteItem, DownloadError>;

    /// List the members of a collection locator
    async fn lookup_collection(&self, locator: &str) -> Result<CollectionLookup, DownloadError>;
}

/// Byte transfer of one selected variant
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Write `variant` of `item` to `target`, returning bytes written.
    ///
    /// Implementations write to a `.part` sibling and rename it into place
    /// once complete, so `target` never holds a partial file.
    async fn transfer(
        &self,
        item: &RemoteItem,
        variant: &StreamVariant,
        target: &Path,
    ) -> Result<u64, DownloadError>;
}

/// Audio extraction/encoding
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Encode the audio track of `input` into `output`.
    ///
    /// Returns `DownloadError::NoAudioTrack` when `input` has no audio.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), DownloadError>;
}

/// The set of collaborators one run uses
#[derive(Clone)]
pub struct Capabilities {
    pub catalog: Arc<dyn MediaCatalog>,
    pub transfer: Arc<dyn Transfer>,
    pub transcoder: Arc<dyn Transcoder>,
}

impl Capabilities {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        transfer: Arc<dyn Transfer>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            catalog,
            transfer,
            transcoder,
        }
    }
}

// Common data models for the fetch pipeline

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{DownloadError, ItemFailure};

/// Kind of rendition a variant carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    /// Audio-only stream
    Audio,
    /// Muxed video with audio
    Video,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// One downloadable rendition of a remote item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Format ID (e.g., "18", "140")
    pub id: String,
    pub kind: VariantKind,
    /// Height in pixels for video, bitrate in kbps for audio
    pub quality: u32,
    /// File extension (mp4, webm, m4a)
    pub ext: String,
    /// Direct media URL, when the catalog exposes one
    pub url: Option<String>,
    /// Codec (avc1, mp4a, opus)
    pub codec: Option<String>,
    /// File size in bytes (exact or approximate)
    pub filesize: Option<u64>,
}

/// Handle to a discoverable media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub title: String,
    /// Page URL the item was resolved from
    pub locator: String,
    /// Empty for flat collection entries that still need resolving
    pub variants: Vec<StreamVariant>,
}

impl RemoteItem {
    pub fn is_resolved(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn to_ref(&self) -> ItemRef {
        ItemRef {
            id: self.id.clone(),
            title: self.title.clone(),
            locator: self.locator.clone(),
        }
    }
}

/// Lightweight identity of an item, carried by failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub title: String,
    pub locator: String,
}

/// A transferred file owned by exactly one task until renamed or consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub path: PathBuf,
    /// Title of the originating item
    pub title: String,
    /// True when the file was already present and no transfer happened
    pub skipped: bool,
}

/// End-to-end strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Audio-only variant, transcoded to the configured audio format
    #[default]
    Audio,
    /// Highest-quality video variant, kept as-is
    Video,
}

impl Mode {
    /// Variant kind the materializer selects for this mode
    pub fn variant_kind(&self) -> VariantKind {
        match self {
            Self::Audio => VariantKind::Audio,
            Self::Video => VariantKind::Video,
        }
    }

    /// Whether the transcode step runs after materialization
    pub fn transcodes(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variant_kind())
    }
}

impl FromStr for Mode {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(DownloadError::InvalidConfig(format!("unknown mode: {}", other))),
        }
    }
}

/// Target format for the transcode step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Opus,
    Flac,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Flac => "flac",
        }
    }

    /// ffmpeg encoder arguments
    pub fn codec_args(&self) -> &'static [&'static str] {
        match self {
            Self::Mp3 => &["-codec:a", "libmp3lame", "-q:a", "2", "-f", "mp3"],
            Self::M4a => &["-codec:a", "aac", "-b:a", "192k", "-f", "ipod"],
            Self::Opus => &["-codec:a", "libopus", "-b:a", "160k", "-f", "opus"],
            Self::Flac => &["-codec:a", "flac", "-f", "flac"],
        }
    }
}

impl FromStr for AudioFormat {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "m4a" | "aac" => Ok(Self::M4a),
            "opus" => Ok(Self::Opus),
            "flac" => Ok(Self::Flac),
            other => Err(DownloadError::InvalidConfig(format!(
                "unknown audio format: {}",
                other
            ))),
        }
    }
}

/// Per-item result of a collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        index: usize,
        path: PathBuf,
        /// Final file was already present; nothing was transferred
        skipped: bool,
    },
    Failure(ItemFailure),
}

impl Outcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Success { index, .. } => *index,
            Self::Failure(failure) => failure.index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Success { path, .. } => Some(path),
            Self::Failure(_) => None,
        }
    }
}

/// Result of an auto-classified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Single(PathBuf),
    Collection(Vec<Outcome>),
}

pub const DEFAULT_OUTPUT_DIR: &str = "downloads";
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Fetch configuration, passed explicitly through every layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Destination directory when a call does not name one
    pub output_dir: PathBuf,
    /// Pipeline slot count
    pub concurrency: usize,
    pub audio_format: AudioFormat,
    /// Rename materialized files to their title slug
    pub rename: bool,
    /// Stop dispatching new items after the first failure
    pub fail_fast: bool,
    /// Candidates requested from a free-text search
    pub search_results: usize,
    /// Longest a transfer may sit without receiving data, and the deadline
    /// for catalog calls
    pub timeout_seconds: u64,
    /// Wall-clock ceiling for one yt-dlp transfer; stalls are caught by
    /// `timeout_seconds` long before this
    pub transfer_deadline_seconds: u64,
    pub transcode_timeout_seconds: u64,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: DEFAULT_CONCURRENCY,
            audio_format: AudioFormat::Mp3,
            rename: true,
            fail_fast: false,
            search_results: 5,
            timeout_seconds: 300,
            transfer_deadline_seconds: 6 * 60 * 60,
            transcode_timeout_seconds: 600,
            proxy: None,
            ytdlp_path: None,
            ffmpeg_path: None,
        }
    }
}

impl FetchConfig {
    /// Default config overlaid with `TUNEGRAB_*` environment variables
    pub fn from_env() -> Result<Self, DownloadError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DownloadError> {
        if let Some(dir) = lookup("TUNEGRAB_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("TUNEGRAB_CONCURRENCY") {
            let value = raw.trim().parse::<usize>().map_err(|e| {
                DownloadError::InvalidConfig(format!("TUNEGRAB_CONCURRENCY={}: {}", raw, e))
            })?;
            self.concurrency = value;
        }
        if let Some(raw) = lookup("TUNEGRAB_AUDIO_FORMAT") {
            self.audio_format = raw.parse()?;
        }
        if let Some(proxy) = lookup("TUNEGRAB_PROXY") {
            self.proxy = Some(proxy);
        }
        if let Some(path) = lookup("TUNEGRAB_YTDLP") {
            self.ytdlp_path = Some(path);
        }
        if let Some(path) = lookup("TUNEGRAB_FFMPEG") {
            self.ffmpeg_path = Some(path);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.concurrency == 0 {
            return Err(DownloadError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout_seconds == 0 || self.transfer_deadline_seconds == 0 {
            return Err(DownloadError::InvalidConfig(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.search_results == 0 {
            return Err(DownloadError::InvalidConfig(
                "search_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_audio_format(mut self, format: AudioFormat) -> Self {
        self.audio_format = format;
        self
    }

    pub fn with_rename(mut self, enabled: bool) -> Self {
        self.rename = enabled;
        self
    }

    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_transfer_deadline(mut self, seconds: u64) -> Self {
        self.transfer_deadline_seconds = seconds;
        self
    }
}

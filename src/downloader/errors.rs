// Error types for resolution, materialization and transcoding

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::models::{ItemRef, VariantKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Search or resolution produced nothing
    #[error("No result found for {0:?}")]
    NotFound(String),

    /// Item has no rendition of the requested kind
    #[error("No {kind} stream available for \"{title}\"")]
    NoStream { title: String, kind: VariantKind },

    /// Transcode source carries no decodable audio track
    #[error("No audio track found in {}", .0.display())]
    NoAudioTrack(PathBuf),

    /// Directory creation, rename or delete failed
    #[error("Filesystem error at {}: {message}", .path.display())]
    Filesystem { path: PathBuf, message: String },

    /// Network timeout while talking to the remote site
    #[error("Network timeout: the remote site is not responding")]
    NetworkTimeout,

    /// Remote site blocked the request (429, bot detection, etc.)
    #[error("Request was blocked by the remote site: {0}")]
    Blocked(String),

    /// yt-dlp or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Locator is syntactically valid but the site rejected it
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse tool JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Byte transfer failed
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Item was never dispatched because the run was cancelled
    #[error("Cancelled before dispatch")]
    Cancelled,

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DownloadError {
    pub fn fs(path: impl AsRef<Path>, err: io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }
}

// Classify raw tool stderr into a typed error
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if lower.contains("429") || lower.contains("too many requests") || lower.contains("bot") {
            return Self::Blocked(s);
        }

        if lower.contains("command not found")
            || lower.contains("no such file")
            || lower.contains("tool not found")
        {
            return Self::ToolNotFound(s);
        }

        if lower.contains("invalid url") || lower.contains("unsupported url") {
            return Self::InvalidUrl(s);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::ParseError(s);
        }

        if lower.contains("video unavailable") || lower.contains("not found") {
            return Self::NotFound(s);
        }

        Self::Unknown(s)
    }
}

/// A per-item error captured inside the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("item #{index} \"{}\" failed: {error}", .item.title)]
pub struct ItemFailure {
    /// Position of the item in the input collection
    pub index: usize,
    pub item: ItemRef,
    #[source]
    pub error: DownloadError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_detection() {
        let err = DownloadError::from("ERROR: Read timed out.".to_string());
        assert_eq!(err, DownloadError::NetworkTimeout);
    }

    #[test]
    fn test_rate_limit_detection() {
        let err = DownloadError::from("HTTP Error 429: Too Many Requests".to_string());
        assert!(matches!(err, DownloadError::Blocked(_)));
    }

    #[test]
    fn test_unsupported_url_detection() {
        let err = DownloadError::from("ERROR: Unsupported URL: https://example.com".to_string());
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }

    #[test]
    fn test_unavailable_maps_to_not_found() {
        let err = DownloadError::from("ERROR: [youtube] abc: Video unavailable".to_string());
        assert!(matches!(err, DownloadError::NotFound(_)));
    }

    #[test]
    fn test_unrecognized_is_unknown() {
        let err = DownloadError::from("something odd happened".to_string());
        assert_eq!(err, DownloadError::Unknown("something odd happened".to_string()));
    }

    #[test]
    fn test_item_failure_message() {
        let failure = ItemFailure {
            index: 2,
            item: ItemRef {
                id: "abc".to_string(),
                title: "Song".to_string(),
                locator: "https://example.com/abc".to_string(),
            },
            error: DownloadError::Cancelled,
        };
        assert_eq!(failure.to_string(), "item #2 \"Song\" failed: Cancelled before dispatch");
    }
}

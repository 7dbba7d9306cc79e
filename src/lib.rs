//! Playlist-aware media fetcher: resolves URLs or search text, expands
//! playlists, downloads over a bounded worker pool and optionally converts
//! to audio.

pub mod downloader;

pub use downloader::{
    AudioFormat, Downloader, DownloadError, FetchConfig, FetchResult, Mode, Outcome,
};

// Downloader module - resolve, expand, fetch and transcode media items

pub mod backends;
pub mod collection;
pub mod errors;
pub mod format_selector;
pub mod materializer;
pub mod models;
pub mod naming;
pub mod orchestrator;
pub mod pipeline;
pub mod resolver;
pub mod tools;
pub mod traits;
pub mod transcoder;
pub mod utils;

#[cfg(test)]
mod testing;

pub use errors::{DownloadError, ItemFailure};
pub use models::{
    AudioFormat, FetchConfig, FetchResult, ItemRef, MaterializedFile, Mode, Outcome, RemoteItem,
    StreamVariant, VariantKind,
};
pub use orchestrator::Downloader;
pub use pipeline::Pipeline;
pub use traits::{Capabilities, CollectionLookup, MediaCatalog, Transcoder, Transfer};

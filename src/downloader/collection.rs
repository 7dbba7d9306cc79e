// Collection expander - playlist detection and member listing

use tracing::{debug, warn};

use super::errors::DownloadError;
use super::models::RemoteItem;
use super::resolver::{self, InputKind};
use super::traits::{CollectionLookup, MediaCatalog};

/// How an input should be handled
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Non-empty ordered member list
    Collection(Vec<RemoteItem>),
    /// Free text, a plain item locator, or an empty collection
    SingleItem,
    /// Lookup failed; callers handle the input as a single item
    Ambiguous(String),
}

impl Classification {
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

pub async fn classify(catalog: &dyn MediaCatalog, input: &str) -> Classification {
    let locator = match resolver::classify(input) {
        InputKind::Locator(url) => url,
        InputKind::Query(_) | InputKind::Empty => return Classification::SingleItem,
    };

    match catalog.lookup_collection(&locator).await {
        Ok(CollectionLookup::Members(members)) if !members.is_empty() => {
            debug!(locator = %locator, members = members.len(), "Input is a collection");
            Classification::Collection(members)
        }
        Ok(_) => Classification::SingleItem,
        Err(e) => {
            warn!(locator = %locator, error = %e, "Collection lookup failed, treating as single item");
            Classification::Ambiguous(e.to_string())
        }
    }
}

pub async fn is_collection(catalog: &dyn MediaCatalog, input: &str) -> bool {
    classify(catalog, input).await.is_collection()
}

/// Ordered members of `input`, or `NotFound` when it is not a collection
pub async fn expand(catalog: &dyn MediaCatalog, input: &str) -> Result<Vec<RemoteItem>, DownloadError> {
    match classify(catalog, input).await {
        Classification::Collection(members) => Ok(members),
        Classification::SingleItem | Classification::Ambiguous(_) => {
            Err(DownloadError::NotFound(format!("no collection at {}", input.trim())))
        }
    }
}

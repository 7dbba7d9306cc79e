// Identity resolver - turns user input into one resolved item

use tracing::{debug, info};
use url::Url;

use super::errors::DownloadError;
use super::models::RemoteItem;
use super::traits::MediaCatalog;

/// What a user-supplied string is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Absolute URL with both a scheme and a host
    Locator(String),
    /// Free-text search query
    Query(String),
    /// Nothing to look up
    Empty,
}

pub fn classify(input: &str) -> InputKind {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return InputKind::Empty;
    }

    match Url::parse(trimmed) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => {
            InputKind::Locator(trimmed.to_string())
        }
        _ => InputKind::Query(trimmed.to_string()),
    }
}

pub fn is_locator(input: &str) -> bool {
    matches!(classify(input), InputKind::Locator(_))
}

/// Resolve a locator directly, or search and take the first candidate
pub async fn resolve(catalog: &dyn MediaCatalog, input: &str) -> Result<RemoteItem, DownloadError> {
    match classify(input) {
        InputKind::Empty => Err(DownloadError::NotFound(input.to_string())),
        InputKind::Locator(url) => {
            debug!(catalog = catalog.name(), url = %url, "Resolving locator");
            catalog.resolve_locator(&url).await
        }
        InputKind::Query(query) => {
            debug!(catalog = catalog.name(), query = %query, "Searching");
            let first = catalog
                .search(&query)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| DownloadError::NotFound(query.clone()))?;
            info!(query = %query, title = %first.title, "Search picked first result");
            hydrate(catalog, first).await
        }
    }
}

/// Fill in the variants of a flat search or collection entry
pub async fn hydrate(catalog: &dyn MediaCatalog, item: RemoteItem) -> Result<RemoteItem, DownloadError> {
    if item.is_resolved() {
        return Ok(item);
    }
    catalog.resolve_locator(&item.locator).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{item, unresolved, FakeCatalog};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_url_is_locator() {
        assert_eq!(
            classify("https://example.com/watch?x=1"),
            InputKind::Locator("https://example.com/watch?x=1".to_string())
        );
        assert!(is_locator("  http://youtu.be/abc  "));
    }

    #[test]
    fn test_free_text_is_query() {
        assert_eq!(
            classify("some random search text"),
            InputKind::Query("some random search text".to_string())
        );
    }

    #[test]
    fn test_scheme_without_host_is_query() {
        assert!(!is_locator("mailto:someone@example.com"));
        assert!(!is_locator("artist:song"));
        assert!(!is_locator("example.com/watch"));
    }

    #[test]
    fn test_blank_is_empty() {
        assert_eq!(classify(""), InputKind::Empty);
        assert_eq!(classify("   "), InputKind::Empty);
    }

    #[tokio::test]
    async fn test_empty_input_fails_without_search() {
        let catalog = FakeCatalog::default();
        let err = resolve(&catalog, "").await.unwrap_err();
        assert!(matches!(err, DownloadError::NotFound(_)));
        assert_eq!(catalog.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_locator_resolves_directly() {
        let song = item("abc", "Song");
        let catalog = FakeCatalog::default().with_item(song.clone());

        let resolved = resolve(&catalog, &song.locator).await.unwrap();
        assert_eq!(resolved, song);
        assert_eq!(catalog.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_picks_first_candidate() {
        let first = item("one", "First");
        let second = item("two", "Second");
        let catalog = FakeCatalog::default().with_search("song", vec![first.clone(), second]);

        let resolved = resolve(&catalog, "song").await.unwrap();
        assert_eq!(resolved.id, "one");
    }

    #[tokio::test]
    async fn test_query_without_results_is_not_found() {
        let catalog = FakeCatalog::default();
        let err = resolve(&catalog, "nothing matches this").await.unwrap_err();
        assert_eq!(err, DownloadError::NotFound("nothing matches this".to_string()));
    }

    #[tokio::test]
    async fn test_flat_search_result_is_hydrated() {
        let full = item("one", "First");
        let catalog = FakeCatalog::default()
            .with_item(full.clone())
            .with_search("first", vec![unresolved(&full)]);

        let resolved = resolve(&catalog, "first").await.unwrap();
        assert!(resolved.is_resolved());
        assert_eq!(catalog.resolve_calls.load(Ordering::SeqCst), 1);
    }
}

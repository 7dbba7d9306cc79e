// Item materializer - variant selection and transfer to local storage

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::errors::DownloadError;
use super::format_selector::FormatSelector;
use super::models::{MaterializedFile, RemoteItem, VariantKind};
use super::naming::path_with_stem;
use super::traits::Transfer;
use super::utils::ensure_dir;

/// In-progress sibling of a transfer target
pub fn part_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

pub struct Materializer {
    transfer: Arc<dyn Transfer>,
}

impl Materializer {
    pub fn new(transfer: Arc<dyn Transfer>) -> Self {
        Self { transfer }
    }

    /// Select the `kind` variant of `item` and transfer it to
    /// `<destination>/<stem>.<ext>`, skipping the transfer when that file
    /// already exists.
    pub async fn materialize(
        &self,
        item: &RemoteItem,
        kind: VariantKind,
        destination: &Path,
        stem: &str,
    ) -> Result<MaterializedFile, DownloadError> {
        let variant = FormatSelector::select(item, kind)?;
        ensure_dir(destination).await?;

        let target = path_with_stem(destination, stem, &variant.ext);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            info!(title = %item.title, path = %target.display(), "Already downloaded, skipping transfer");
            return Ok(MaterializedFile {
                path: target,
                title: item.title.clone(),
                skipped: true,
            });
        }

        debug!(
            backend = self.transfer.name(),
            title = %item.title,
            variant = %variant.id,
            size = ?FormatSelector::format_size(variant.filesize),
            "Starting transfer"
        );

        match self.transfer.transfer(item, variant, &target).await {
            Ok(bytes) => {
                info!(title = %item.title, path = %target.display(), bytes, "Downloaded");
                Ok(MaterializedFile {
                    path: target,
                    title: item.title.clone(),
                    skipped: false,
                })
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(part_path(&target)).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{item, video_only_item, FakeTransfer};
    use tempfile::tempdir;

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/song.m4a")),
            PathBuf::from("/tmp/song.m4a.part")
        );
    }

    #[tokio::test]
    async fn test_creates_destination_and_transfers() {
        let root = tempdir().unwrap();
        let dest = root.path().join("nested").join("downloads");
        let transfer = Arc::new(FakeTransfer::default());
        let materializer = Materializer::new(transfer.clone());

        let file = materializer
            .materialize(&item("a", "Song"), VariantKind::Audio, &dest, "Song")
            .await
            .unwrap();

        assert_eq!(file.path, dest.join("Song.m4a"));
        assert_eq!(file.title, "Song");
        assert!(!file.skipped);
        assert_eq!(tokio::fs::read_to_string(&file.path).await.unwrap(), "a:a128");
        assert_eq!(transfer.calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_target_skips_transfer() {
        let dest = tempdir().unwrap();
        let existing = dest.path().join("Song.mp4");
        tokio::fs::write(&existing, b"complete").await.unwrap();
        let transfer = Arc::new(FakeTransfer::default());
        let materializer = Materializer::new(transfer.clone());

        let file = materializer
            .materialize(&item("a", "Song"), VariantKind::Video, dest.path(), "Song")
            .await
            .unwrap();

        assert!(file.skipped);
        assert_eq!(transfer.calls(), 0);
        assert_eq!(tokio::fs::read(&existing).await.unwrap(), b"complete");
    }

    #[tokio::test]
    async fn test_missing_variant_is_no_stream() {
        let dest = tempdir().unwrap();
        let transfer = Arc::new(FakeTransfer::default());
        let materializer = Materializer::new(transfer.clone());

        let err = materializer
            .materialize(&video_only_item("a", "Clip"), VariantKind::Audio, dest.path(), "Clip")
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::NoStream { .. }));
        assert_eq!(transfer.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_nothing() {
        let dest = tempdir().unwrap();
        let transfer = Arc::new(FakeTransfer::default().with_failure("a"));
        let materializer = Materializer::new(transfer);

        let result = materializer
            .materialize(&item("a", "Song"), VariantKind::Audio, dest.path(), "Song")
            .await;

        assert!(matches!(result, Err(DownloadError::Transfer(_))));
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }
}

// Bounded concurrent pipeline - fans a collection out over a fixed pool of slots

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::errors::{DownloadError, ItemFailure};
use super::format_selector::FormatSelector;
use super::materializer::Materializer;
use super::models::{AudioFormat, FetchConfig, ItemRef, Mode, Outcome, RemoteItem};
use super::naming::{path_with_stem, rename_to_stem, NamePlan, PlannedName};
use super::resolver;
use super::transcoder::AudioTranscoder;
use super::traits::Capabilities;
use super::utils::ensure_dir;

/// Runs items through resolve, materialize, rename and optional transcode
#[derive(Clone)]
pub struct Pipeline {
    caps: Capabilities,
    audio_format: AudioFormat,
    rename: bool,
    fail_fast: bool,
}

/// One item bound to its planned name
struct Job {
    caps: Capabilities,
    audio_format: AudioFormat,
    rename: bool,
    item: RemoteItem,
    name: PlannedName,
    mode: Mode,
    destination: PathBuf,
}

/// Dispatch record, kept in input order
struct Slot {
    index: usize,
    item: ItemRef,
    handle: Option<JoinHandle<Result<(PathBuf, bool), DownloadError>>>,
}

impl Pipeline {
    pub fn new(caps: Capabilities, config: &FetchConfig) -> Self {
        Self {
            caps,
            audio_format: config.audio_format,
            rename: config.rename,
            fail_fast: config.fail_fast,
        }
    }

    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Run every item with at most `limit` in flight.
    ///
    /// Returns one outcome per input item, in input order. Only setup errors
    /// (zero limit, unusable destination) fail the run as a whole.
    pub async fn run(
        &self,
        items: Vec<RemoteItem>,
        mode: Mode,
        destination: &Path,
        limit: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<Outcome>, DownloadError> {
        if limit == 0 {
            return Err(DownloadError::InvalidConfig(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        ensure_dir(destination).await?;

        let total = items.len();
        let names = NamePlan::for_titles(items.iter().map(|i| i.title.as_str()));
        info!(items = total, limit, %mode, destination = %destination.display(), "Starting collection run");

        // fail_fast stops dispatch without cancelling the caller's token
        let dispatch = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut slots = Vec::with_capacity(total);

        for (index, (item, name)) in items.into_iter().zip(names).enumerate() {
            let item_ref = item.to_ref();

            let permit = if dispatch.is_cancelled() {
                None
            } else {
                tokio::select! {
                    biased;
                    _ = dispatch.cancelled() => None,
                    permit = semaphore.clone().acquire_owned() => permit.ok(),
                }
            };

            let permit = match permit {
                Some(permit) if !dispatch.is_cancelled() => permit,
                _ => {
                    debug!(index, title = %item_ref.title, "Not dispatched");
                    slots.push(Slot { index, item: item_ref, handle: None });
                    continue;
                }
            };

            let job = self.job(item, name, mode, destination);
            let fail_fast = self.fail_fast;
            let stop = dispatch.clone();
            let title = item_ref.title.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                debug!(index, title = %title, "Dispatched");
                let result = job.run().await;
                if let Err(e) = &result {
                    warn!(index, title = %title, error = %e, "Item failed");
                    if fail_fast {
                        stop.cancel();
                    }
                }
                result
            });
            slots.push(Slot { index, item: item_ref, handle: Some(handle) });
        }

        let mut outcomes = Vec::with_capacity(total);
        for slot in slots {
            let result = match slot.handle {
                None => Err(DownloadError::Cancelled),
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(DownloadError::Unknown(format!("item task aborted: {}", e))),
                },
            };

            outcomes.push(match result {
                Ok((path, skipped)) => Outcome::Success {
                    index: slot.index,
                    path,
                    skipped,
                },
                Err(error) => Outcome::Failure(ItemFailure {
                    index: slot.index,
                    item: slot.item,
                    error,
                }),
            });
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(succeeded, failed = total - succeeded, "Collection run finished");
        Ok(outcomes)
    }

    /// Run one item inline, without the pool, propagating its error
    pub async fn run_single(
        &self,
        item: RemoteItem,
        mode: Mode,
        destination: &Path,
    ) -> Result<PathBuf, DownloadError> {
        ensure_dir(destination).await?;
        let name = PlannedName::for_title(&item.title);
        let (path, _) = self.job(item, name, mode, destination).run().await?;
        Ok(path)
    }

    fn job(&self, item: RemoteItem, name: PlannedName, mode: Mode, destination: &Path) -> Job {
        Job {
            caps: self.caps.clone(),
            audio_format: self.audio_format,
            rename: self.rename,
            item,
            name,
            mode,
            destination: destination.to_path_buf(),
        }
    }
}

impl Job {
    /// Final path and whether it was already on disk
    async fn run(self) -> Result<(PathBuf, bool), DownloadError> {
        let item = resolver::hydrate(self.caps.catalog.as_ref(), self.item).await?;
        let kind = self.mode.variant_kind();
        let variant = FormatSelector::select(&item, kind)?;

        let final_ext = if self.mode.transcodes() {
            self.audio_format.extension()
        } else {
            variant.ext.as_str()
        };
        let final_path = path_with_stem(&self.destination, self.name.final_stem(self.rename), final_ext);
        if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            info!(title = %item.title, path = %final_path.display(), "Already present, skipping");
            return Ok((final_path, true));
        }

        let file = Materializer::new(self.caps.transfer.clone())
            .materialize(&item, kind, &self.destination, &self.name.staging)
            .await?;

        let path = if self.rename {
            rename_to_stem(&file, &self.name.slug).await?
        } else {
            file.path
        };

        if !self.mode.transcodes() {
            return Ok((path, false));
        }

        let output = AudioTranscoder::new(self.caps.transcoder.clone(), self.audio_format)
            .transcode_to_audio(&path)
            .await?;
        Ok((output, false))
    }
}

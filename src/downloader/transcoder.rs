// Audio transcoder - move-semantics wrapper around a Transcoder backend

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::materializer::part_path;
use super::models::AudioFormat;
use super::traits::Transcoder;

pub struct AudioTranscoder {
    transcoder: Arc<dyn Transcoder>,
    format: AudioFormat,
}

impl AudioTranscoder {
    pub fn new(transcoder: Arc<dyn Transcoder>, format: AudioFormat) -> Self {
        Self { transcoder, format }
    }

    /// Sibling path the audio for `source` is written to
    pub fn output_path(&self, source: &Path) -> PathBuf {
        source.with_extension(self.format.extension())
    }

    /// Encode `path` into a sibling audio file and remove `path`.
    ///
    /// On failure `path` is left untouched and no output file remains.
    pub async fn transcode_to_audio(&self, path: &Path) -> Result<PathBuf, DownloadError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(DownloadError::NotFound(path.display().to_string()));
        }

        let output = self.output_path(path);
        if output == path {
            debug!(path = %path.display(), "Already in target format");
            return Ok(output);
        }

        let partial = part_path(&output);
        debug!(
            backend = self.transcoder.name(),
            from = %path.display(),
            to = %output.display(),
            "Transcoding"
        );

        if let Err(e) = self.transcoder.transcode(path, &partial, self.format).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&partial, &output).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DownloadError::fs(&output, e));
        }

        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Transcoded but could not remove source");
            return Err(DownloadError::fs(path, e));
        }

        info!(path = %output.display(), format = self.format.extension(), "Converted");
        Ok(output)
    }
}

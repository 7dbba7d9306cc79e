// ffmpeg audio extraction

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{AudioFormat, FetchConfig};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::traits::Transcoder;
use crate::downloader::utils::{failure_message, run_output_with_timeout};

lazy_static::lazy_static! {
    // "Stream map '0:a:0' matches no streams." / "Output file #0 does not contain any stream"
    static ref NO_AUDIO_RE: Regex =
        Regex::new(r"(?i)matches no streams|does not contain any stream").unwrap();
}

pub struct FfmpegTranscoder {
    program: String,
    timeout_seconds: u64,
}

impl FfmpegTranscoder {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            program: ToolManager::from_config(config).program(ToolType::Ffmpeg),
            timeout_seconds: config.transcode_timeout_seconds,
        }
    }

    fn build_args(input: &Path, output: &Path, format: AudioFormat) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(input.to_string_lossy().into_owned());
        args.extend(["-vn", "-map", "0:a:0"].iter().map(|s| s.to_string()));
        args.extend(format.codec_args().iter().map(|s| s.to_string()));
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), DownloadError> {
        let args = Self::build_args(input, output, format);
        let result = run_output_with_timeout(&self.program, args, self.timeout_seconds).await?;

        if result.status.success() {
            debug!(input = %input.display(), output = %output.display(), "ffmpeg finished");
            return Ok(());
        }

        let message = failure_message(&result, &self.program);
        if NO_AUDIO_RE.is_match(&message) {
            return Err(DownloadError::NoAudioTrack(input.to_path_buf()));
        }
        Err(DownloadError::ExecutionError(message))
    }
}

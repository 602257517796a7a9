//! Single-item downloads.

use std::path::Path;

use tracing::info;

use super::{DownloadOutcome, DownloadPipeline};
use crate::error::Result;
use crate::media::{MediaFormat, MediaInfo, sanitize_title_or};
use crate::staging::StagingArtifacts;
use crate::tags::DEFAULT_ALBUM;

/// File stem used when a title has no usable characters.
const FALLBACK_STEM: &str = "download";

impl DownloadPipeline {
    /// Download one item as `format`.
    ///
    /// Emits a cancellation (not an error) when no destination is chosen.
    pub async fn run_single(&self, url: &str, format: MediaFormat) -> DownloadOutcome {
        self.sink.status("Fetching video information...");
        let info = match self.ctx.extractor().fetch_info(url).await {
            Ok(info) => info,
            Err(e) => return self.fail(&e, None),
        };

        let stem = sanitize_title_or(&info.title, FALLBACK_STEM);
        let suggested = format!("{stem}.{}", format.extension());
        let Some(dest) = self.prompt.choose_file(&suggested, format).await else {
            info!("No destination chosen for {}", url);
            self.sink.cancelled();
            return DownloadOutcome::Cancelled;
        };

        match self.download_single(url, &info, &dest, format).await {
            Ok(()) => {
                info!("Saved {}", dest.display());
                self.sink.completed(dest.clone());
                DownloadOutcome::Saved(dest)
            }
            Err(e) => self.fail(&e, None),
        }
    }

    /// Everything after the destination prompt; staging is released on return.
    async fn download_single(
        &self,
        url: &str,
        info: &MediaInfo,
        dest: &Path,
        format: MediaFormat,
    ) -> Result<()> {
        let staging = StagingArtifacts::allocate(self.ctx.staging_dir())?;
        match format {
            MediaFormat::Mp4 => {
                self.sink.status("Downloading video...");
                self.ctx
                    .extractor()
                    .download_video(url, dest, &self.sink)
                    .await?;
                self.sink.status("Processing video...");
            }
            MediaFormat::Mp3 => {
                self.produce_mp3(url, info, dest, &staging, DEFAULT_ALBUM)
                    .await?;
            }
        }
        Ok(())
    }
}

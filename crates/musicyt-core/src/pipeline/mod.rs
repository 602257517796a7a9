//! Download orchestration.
//!
//! [`DownloadPipeline`] turns one [`DownloadRequest`] into files on disk,
//! publishing [`ProgressEvent`](crate::events::ProgressEvent)s along the way.
//! Single items and playlists share the MP3 sub-sequence implemented here:
//! staged audio download, best-effort cover art, transcode, best-effort tags.

mod playlist;
mod single;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::classify::classify;
use crate::context::AppContext;
use crate::destination::DestinationPrompt;
use crate::error::{Error, Result};
use crate::events::{BatchSummary, EventSink};
use crate::media::{DownloadRequest, MediaInfo};
use crate::staging::StagingArtifacts;
use crate::tags::{CoverImage, TagRecord, write_tags};

/// Terminal result of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A single file was written.
    Saved(PathBuf),
    /// A playlist run finished.
    PlaylistSaved {
        /// Destination folder.
        folder: PathBuf,
        /// Per-entry counts.
        summary: BatchSummary,
    },
    /// The user declined a destination or cancelled mid-flight.
    Cancelled,
    /// The invocation failed with a user-facing message.
    Failed(String),
}

impl DownloadOutcome {
    /// Whether the invocation produced output.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Saved(_) | Self::PlaylistSaved { .. })
    }
}

/// Drives single-item and playlist downloads.
pub struct DownloadPipeline {
    ctx: AppContext,
    prompt: Arc<dyn DestinationPrompt>,
    sink: EventSink,
}

impl std::fmt::Debug for DownloadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadPipeline")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl DownloadPipeline {
    /// Create a pipeline publishing into `sink`.
    pub fn new(ctx: AppContext, prompt: Arc<dyn DestinationPrompt>, sink: EventSink) -> Self {
        Self { ctx, prompt, sink }
    }

    /// Run a request through the matching pipeline.
    pub async fn run(&self, request: &DownloadRequest) -> DownloadOutcome {
        debug!("Download request: {:?}", request);
        if request.is_playlist {
            self.run_playlist(&request.url, request.format).await
        } else {
            self.run_single(&request.url, request.format).await
        }
    }

    /// Report a failure that ends the invocation.
    fn fail(&self, error: &Error, prefix: Option<&str>) -> DownloadOutcome {
        if error.is_cancelled() {
            self.sink.cancelled();
            return DownloadOutcome::Cancelled;
        }
        error!("Download error: {}", error);
        let friendly = classify(error);
        let message = match prefix {
            Some(prefix) => format!("{prefix}{friendly}"),
            None => friendly.to_string(),
        };
        self.sink.error(message.clone());
        DownloadOutcome::Failed(message)
    }

    /// Staged audio download, cover art, transcode and tagging into `dest`.
    ///
    /// Staging files are removed when `staging` goes out of scope in the
    /// caller. Thumbnail and tag failures are logged only.
    async fn produce_mp3(
        &self,
        source_url: &str,
        info: &MediaInfo,
        dest: &Path,
        staging: &StagingArtifacts,
        album_fallback: &str,
    ) -> Result<()> {
        self.sink.status("Downloading audio...");
        self.ctx
            .extractor()
            .download_audio(source_url, staging.audio())
            .await?;

        if let Some(thumbnail) = info.thumbnail.as_deref().filter(|t| !t.is_empty()) {
            self.sink.status("Downloading cover art...");
            if let Err(e) = self
                .ctx
                .thumbnails()
                .fetch(thumbnail, staging.thumbnail())
                .await
            {
                warn!("Thumbnail download failed: {}", e);
            }
        }

        self.sink.status("Converting to MP3 and adding metadata...");
        self.ctx
            .transcoder()
            .to_mp3(staging.audio(), dest, info.duration, &self.sink)
            .await?;

        self.sink.status("Adding metadata and cover art...");
        let mut record = TagRecord::from_media(info, source_url, album_fallback);
        if staging.thumbnail().exists() {
            match tokio::fs::read(staging.thumbnail()).await {
                Ok(data) if !data.is_empty() => {
                    record = record.with_image(CoverImage::front_cover(data));
                }
                Ok(_) => warn!("Thumbnail file is empty, skipping cover art"),
                Err(e) => warn!("Failed to read thumbnail: {}", e),
            }
        }
        if let Err(e) = write_tags(self.ctx.tags(), dest.to_path_buf(), record).await {
            warn!("Failed to write tags: {}", e);
        }
        Ok(())
    }
}

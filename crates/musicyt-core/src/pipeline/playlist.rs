//! Playlist downloads.
//!
//! Entries run strictly one after another. A failing entry is counted and
//! logged, never fatal to the batch.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{DownloadOutcome, DownloadPipeline};
use crate::error::{Error, FileSystemError, Result};
use crate::events::{BatchSummary, ProgressEvent};
use crate::extractor::watch_url;
use crate::media::{MediaFormat, PlaylistEntry, sanitize_title_or};
use crate::normalizer::{ContainerTitleReader, next_free_path, normalize_filenames};
use crate::staging::StagingArtifacts;

/// Prefix of user-facing playlist failures.
const PLAYLIST_FAILURE_PREFIX: &str = "Failed to download playlist: ";

/// Position of an entry within its playlist.
#[derive(Debug, Clone, Copy)]
struct EntryPosition {
    current: usize,
    total: usize,
}

impl DownloadPipeline {
    /// Download every entry of a playlist as `format` into one folder.
    pub async fn run_playlist(&self, url: &str, format: MediaFormat) -> DownloadOutcome {
        self.sink.status("Fetching playlist information...");
        let manifest = match self.ctx.extractor().fetch_playlist(url).await {
            Ok(manifest) => manifest,
            Err(e) => return self.fail(&e, Some(PLAYLIST_FAILURE_PREFIX)),
        };

        if manifest.entries.is_empty() {
            let message = "No videos found in playlist".to_string();
            self.sink.error(message.clone());
            return DownloadOutcome::Failed(message);
        }

        let title = manifest.display_title().to_string();
        let total = manifest.entries.len();
        self.sink.emit(ProgressEvent::PlaylistInfo {
            title: title.clone(),
            count: total,
        });

        let Some(folder) = self.prompt.choose_folder(&title).await else {
            info!("No folder chosen for playlist {}", url);
            self.sink.cancelled();
            return DownloadOutcome::Cancelled;
        };
        if let Err(e) = std::fs::create_dir_all(&folder) {
            let error = Error::FileSystem(FileSystemError::CreateDirFailed {
                path: folder.clone(),
                reason: e.to_string(),
            });
            return self.fail(&error, Some(PLAYLIST_FAILURE_PREFIX));
        }
        info!("Playlist download to: {}", folder.display());

        let mut summary = BatchSummary::default();
        for (index, entry) in manifest.entries.iter().enumerate() {
            if self.ctx.is_cancelled() {
                info!("Playlist cancelled after {} entries", summary.total());
                self.sink.cancelled();
                return DownloadOutcome::Cancelled;
            }

            let position = EntryPosition {
                current: index + 1,
                total,
            };
            match self
                .download_entry(entry, position, &folder, format, &title)
                .await
            {
                Ok(path) => {
                    summary.succeeded += 1;
                    info!(
                        "Downloaded {}/{}: {}",
                        position.current,
                        total,
                        path.display()
                    );
                }
                Err(e) if e.is_cancelled() => {
                    self.sink.cancelled();
                    return DownloadOutcome::Cancelled;
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!("Failed to download video {}: {}", position.current, e);
                }
            }
        }

        self.sink.status("Verifying filenames...");
        let reader = ContainerTitleReader::new(self.ctx.tags(), self.ctx.transcoder());
        match normalize_filenames(&folder, &reader).await {
            Ok(report) => info!(
                "Filename check: {} renamed, {} unchanged, {} failed",
                report.renamed, report.unchanged, report.failed
            ),
            Err(e) => warn!("Filename check failed: {}", e),
        }

        self.sink.completed(folder.clone());
        self.sink.status(summary.to_string());
        DownloadOutcome::PlaylistSaved { folder, summary }
    }

    /// Fetch full metadata for one entry and download it into `folder`.
    async fn download_entry(
        &self,
        entry: &PlaylistEntry,
        position: EntryPosition,
        folder: &Path,
        format: MediaFormat,
        playlist_title: &str,
    ) -> Result<PathBuf> {
        let EntryPosition { current, total } = position;
        let video_url = watch_url(&entry.id);

        self.sink
            .status(format!("Fetching info for {current}/{total}..."));
        let info = self.ctx.extractor().fetch_info(&video_url).await?;

        let fallback = format!("Video {current}");
        let stem = sanitize_title_or(&info.title, &fallback);
        let display_title = if info.title.trim().is_empty() {
            fallback
        } else {
            info.title.clone()
        };

        self.sink
            .status(format!("Downloading {current}/{total}: {stem}"));
        self.sink.emit(ProgressEvent::PlaylistItem {
            title: display_title,
            current,
            total,
        });

        let dest = next_free_path(folder, &stem, format.extension());
        match format {
            MediaFormat::Mp4 => {
                self.ctx
                    .extractor()
                    .download_video(&video_url, &dest, &self.sink)
                    .await?;
            }
            MediaFormat::Mp3 => {
                let staging = StagingArtifacts::allocate(self.ctx.staging_dir())?;
                self.produce_mp3(&video_url, &info, &dest, &staging, playlist_title)
                    .await?;
            }
        }
        Ok(dest)
    }
}

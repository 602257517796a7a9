//! Application context shared by the pipelines.
//!
//! Created once at start-up from an [`AppConfig`] and passed to every
//! pipeline; it owns the resolved binaries, the staging directory, the
//! collaborators and the cancel flag.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::config::{AppConfig, BinaryPaths};
use crate::error::Result;
use crate::extractor::Extractor;
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::tags::{Id3TagWriter, TagWriter};
use crate::thumbnail::{HttpThumbnailFetcher, ThumbnailFetcher};
use crate::transcoder::Transcoder;

/// Shared state for pipeline invocations.
#[derive(Clone)]
pub struct AppContext {
    binaries: BinaryPaths,
    staging_dir: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    thumbnails: Arc<dyn ThumbnailFetcher>,
    tags: Arc<dyn TagWriter>,
    cancel_flag: Arc<AtomicBool>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("binaries", &self.binaries)
            .field("staging_dir", &self.staging_dir)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build the production context from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let binaries = BinaryPaths::resolve(config);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let thumbnails =
            HttpThumbnailFetcher::new(Duration::from_secs(config.thumbnail_timeout_secs))?;

        info!("Staging directory: {}", config.staging_dir().display());
        Ok(Self {
            binaries,
            staging_dir: config.staging_dir(),
            runner: Arc::new(TokioProcessRunner::with_cancel_flag(Arc::clone(&cancel_flag))),
            thumbnails: Arc::new(thumbnails),
            tags: Arc::new(Id3TagWriter::new()),
            cancel_flag,
        })
    }

    /// Build a context from explicit collaborators.
    pub fn new(
        binaries: BinaryPaths,
        staging_dir: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
        thumbnails: Arc<dyn ThumbnailFetcher>,
        tags: Arc<dyn TagWriter>,
    ) -> Self {
        Self {
            binaries,
            staging_dir: staging_dir.into(),
            runner,
            thumbnails,
            tags,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Staging directory.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Extractor front-end over this context's runner.
    #[must_use]
    pub fn extractor(&self) -> Extractor {
        Extractor::new(
            Arc::clone(&self.runner),
            self.binaries.extractor.clone(),
            self.binaries.transcoder.clone(),
        )
    }

    /// Transcoder front-end over this context's runner.
    #[must_use]
    pub fn transcoder(&self) -> Transcoder {
        Transcoder::new(
            Arc::clone(&self.runner),
            self.binaries.transcoder.clone(),
            self.binaries.probe.clone(),
        )
    }

    /// Thumbnail fetcher.
    #[must_use]
    pub fn thumbnails(&self) -> &dyn ThumbnailFetcher {
        self.thumbnails.as_ref()
    }

    /// Tag writer.
    #[must_use]
    pub fn tags(&self) -> Arc<dyn TagWriter> {
        Arc::clone(&self.tags)
    }

    /// Request cancellation of the running invocation.
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::process::MockProcessRunner;
    use crate::tags::MockTagWriter;
    use crate::thumbnail::MockThumbnailFetcher;

    #[test]
    fn test_from_config_uses_configured_paths() {
        let config = AppConfig {
            extractor_path: Some(PathBuf::from("/opt/yt-dlp")),
            transcoder_path: Some(PathBuf::from("/opt/ffmpeg")),
            probe_path: Some(PathBuf::from("/opt/ffprobe")),
            staging_directory: Some(PathBuf::from("/var/tmp/musicyt")),
            ..Default::default()
        };
        let ctx = AppContext::from_config(&config).unwrap();
        assert_eq!(ctx.binaries.extractor, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(ctx.staging_dir(), Path::new("/var/tmp/musicyt"));
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let ctx = AppContext::new(
            BinaryPaths::default(),
            "/tmp",
            Arc::new(MockProcessRunner::new()),
            Arc::new(MockThumbnailFetcher::new()),
            Arc::new(MockTagWriter::new()),
        );
        let clone = ctx.clone();
        let flag = Arc::clone(&ctx.cancel_flag);

        clone.cancel();
        assert!(ctx.is_cancelled());
        assert!(flag.load(Ordering::SeqCst));
    }
}

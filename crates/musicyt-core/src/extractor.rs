//! Front-end for the external media extractor (`yt-dlp`).

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::args::ArgOptions;
use crate::error::{Error, ProcessError, Result};
use crate::events::EventSink;
use crate::media::{MediaInfo, PlaylistManifest};
use crate::process::{ProcessOutput, ProcessRunner, StructuredOutput};

/// Format selector for merged video downloads.
pub const VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best";

/// Format selector for audio-only downloads.
pub const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio";

static DOWNLOAD_PERCENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").ok());

/// Canonical watch URL for an item id.
#[must_use]
pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// Parse a `[download]  NN.N%` progress line into a rounded percentage.
#[must_use]
pub fn parse_download_percent(line: &str) -> Option<u8> {
    let captures = DOWNLOAD_PERCENT.as_ref()?.captures(line)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(value.round().clamp(0.0, 100.0) as u8)
}

/// Drives the extractor through a [`ProcessRunner`].
#[derive(Clone)]
pub struct Extractor {
    runner: Arc<dyn ProcessRunner>,
    program: PathBuf,
    transcoder: PathBuf,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("program", &self.program)
            .field("transcoder", &self.transcoder)
            .finish_non_exhaustive()
    }
}

impl Extractor {
    /// Create an extractor front-end.
    ///
    /// `transcoder` is passed along so the extractor can merge and remux.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        program: impl Into<PathBuf>,
        transcoder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            transcoder: transcoder.into(),
        }
    }

    /// Fetch full metadata for one item.
    ///
    /// # Errors
    ///
    /// Returns a fetch error when the extractor fails or its output is not
    /// valid metadata; a missing binary stays a spawn error.
    pub async fn fetch_info(&self, url: &str) -> Result<MediaInfo> {
        let options = ArgOptions::new()
            .set("dumpSingleJson", true)
            .set("noWarnings", true)
            .set("noCheckCertificate", true)
            .set("preferFreeFormats", true);
        let info: MediaInfo = self.fetch_json(url, &options).await?;
        debug!("Fetched info for {}: {}", url, info.title);
        Ok(info)
    }

    /// Fetch a flat playlist listing.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch_info`].
    pub async fn fetch_playlist(&self, url: &str) -> Result<PlaylistManifest> {
        let options = ArgOptions::new()
            .set("flatPlaylist", true)
            .set("dumpSingleJson", true)
            .set("noWarnings", true);
        let manifest: PlaylistManifest = self.fetch_json(url, &options).await?;
        info!(
            "Playlist {:?} has {} entries",
            manifest.title,
            manifest.entries.len()
        );
        Ok(manifest)
    }

    /// Download merged video straight to `dest`, relaying download percent
    /// into `sink` while the extractor runs.
    ///
    /// # Errors
    ///
    /// Returns the process error of the extractor run.
    pub async fn download_video(&self, url: &str, dest: &Path, sink: &EventSink) -> Result<()> {
        let options = ArgOptions::new()
            .set("output", dest)
            .set("format", VIDEO_FORMAT)
            .set("mergeOutputFormat", "mp4")
            .set("embedMetadata", true)
            .set("embedThumbnail", true)
            .set("ffmpegLocation", self.transcoder.as_path());
        let args = Self::command(url, &options);

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let relay = async {
            let mut last = None;
            while let Some(line) = rx.recv().await {
                match parse_download_percent(&line) {
                    Some(percent) if last != Some(percent) => {
                        last = Some(percent);
                        sink.percent(percent);
                    }
                    _ => {}
                }
            }
        };
        let (result, ()) = tokio::join!(self.runner.run_streaming(&self.program, &args, tx), relay);
        result.map(|_| ())
    }

    /// Download the best available audio into `staging`.
    ///
    /// # Errors
    ///
    /// Returns the process error of the extractor run.
    pub async fn download_audio(&self, url: &str, staging: &Path) -> Result<()> {
        let options = ArgOptions::new()
            .set("output", staging)
            .set("format", AUDIO_FORMAT)
            .set("extractAudio", true)
            .set("audioFormat", "m4a")
            .set("ffmpegLocation", self.transcoder.as_path());
        let args = Self::command(url, &options);
        self.runner.run(&self.program, &args).await.map(|_| ())
    }

    fn command(url: &str, options: &ArgOptions) -> Vec<String> {
        let mut args = Vec::with_capacity(options.len() * 2 + 1);
        args.push(url.to_string());
        args.extend(options.to_args());
        args
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str, options: &ArgOptions) -> Result<T> {
        let args = Self::command(url, options);
        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|e| into_fetch_error(url, e))?;
        parse_metadata(url, &output)
    }
}

/// A failing extractor run while fetching metadata is a fetch failure.
fn into_fetch_error(url: &str, error: Error) -> Error {
    match error {
        Error::Process(ProcessError::NonZeroExit { stderr, .. }) => Error::fetch(url, stderr),
        other => other,
    }
}

fn parse_metadata<T: DeserializeOwned>(url: &str, output: &ProcessOutput) -> Result<T> {
    match output.structured() {
        StructuredOutput::Json(value) => {
            serde_json::from_value(value).map_err(|e| Error::fetch(url, e.to_string()))
        }
        StructuredOutput::Text(text) => Err(Error::fetch(
            url,
            format!("extractor returned no metadata: {}", text.trim()),
        )),
    }
}

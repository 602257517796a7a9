//! Front-end for the external transcoder (`ffmpeg`) and its probe (`ffprobe`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;
use crate::events::EventSink;
use crate::process::{ProcessRunner, StructuredOutput};

/// Fixed MP3 bitrate.
pub const MP3_BITRATE: &str = "320k";

/// Drives the transcoder and probe through a [`ProcessRunner`].
#[derive(Clone)]
pub struct Transcoder {
    runner: Arc<dyn ProcessRunner>,
    program: PathBuf,
    probe: PathBuf,
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("program", &self.program)
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl Transcoder {
    /// Create a transcoder front-end.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        program: impl Into<PathBuf>,
        probe: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            probe: probe.into(),
        }
    }

    /// Arguments converting `input` to a 320 kbps MP3 at `output`.
    #[must_use]
    pub fn mp3_args(input: &Path, output: &Path) -> Vec<String> {
        [
            "-y",
            "-hide_banner",
            "-nostats",
            "-progress",
            "pipe:1",
            "-i",
        ]
        .iter()
        .map(ToString::to_string)
        .chain(std::iter::once(input.to_string_lossy().into_owned()))
        .chain(
            ["-vn", "-codec:a", "libmp3lame", "-b:a", MP3_BITRATE, "-f", "mp3"]
                .iter()
                .map(ToString::to_string),
        )
        .chain(std::iter::once(output.to_string_lossy().into_owned()))
        .collect()
    }

    /// Convert `input` to MP3 at `output`, relaying percent progress into
    /// `sink` when the source duration is known.
    ///
    /// # Errors
    ///
    /// Returns the process error of the transcoder run.
    pub async fn to_mp3(
        &self,
        input: &Path,
        output: &Path,
        duration_secs: Option<f64>,
        sink: &EventSink,
    ) -> Result<()> {
        let args = Self::mp3_args(input, output);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let relay = async {
            let mut last = None;
            while let Some(line) = rx.recv().await {
                match transcode_percent(&line, duration_secs) {
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

    /// Read the container-level title tag of a media file.
    ///
    /// # Errors
    ///
    /// Returns the process error of the probe run.
    pub async fn probe_title(&self, file: &Path) -> Result<Option<String>> {
        let args: Vec<String> = [
            "-v",
            "error",
            "-show_entries",
            "format_tags=title",
            "-of",
            "json",
        ]
        .iter()
        .map(ToString::to_string)
        .chain(std::iter::once(file.to_string_lossy().into_owned()))
        .collect();

        let output = self.runner.run(&self.probe, &args).await?;
        match output.structured() {
            StructuredOutput::Json(value) => Ok(title_from_probe(&value)),
            StructuredOutput::Text(text) => {
                debug!("Unexpected probe output for {}: {}", file.display(), text);
                Ok(None)
            }
        }
    }
}

/// Map a `-progress` line to a percentage of `duration_secs`.
///
/// Both `out_time_us` and `out_time_ms` carry microseconds.
#[must_use]
pub fn transcode_percent(line: &str, duration_secs: Option<f64>) -> Option<u8> {
    let duration = duration_secs.filter(|d| *d > 0.0)?;
    let (key, value) = line.split_once('=')?;
    if key != "out_time_us" && key != "out_time_ms" {
        return None;
    }
    let micros: f64 = value.trim().parse().ok()?;
    if micros < 0.0 {
        return None;
    }
    let percent = (micros / 1_000_000.0 / duration * 100.0).round().min(100.0);
    Some(percent as u8)
}

fn title_from_probe(value: &Value) -> Option<String> {
    value
        .get("format")?
        .get("tags")?
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("title"))
        .and_then(|(_, v)| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

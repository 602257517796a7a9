//! Renames downloaded files after the titles embedded in them.
//!
//! Each `.mp3`/`.mp4` file in a directory is renamed to its sanitized
//! embedded title. Collisions get a ` (n)` counter. Per-file failures are
//! logged and counted without stopping the scan, and files without a
//! readable title are left alone.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, FileSystemError, Result};
use crate::media::{MediaFormat, sanitize_title};
use crate::tags::{TagWriter, read_tags};
use crate::transcoder::Transcoder;

/// Reads the title embedded in a media file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TitleReader: Send + Sync {
    /// Title of `path`, or `None` when it carries none.
    async fn read_title(&self, path: &Path, format: MediaFormat) -> Result<Option<String>>;
}

/// [`TitleReader`] using ID3 tags for audio and the probe for video.
#[derive(Clone)]
pub struct ContainerTitleReader {
    tags: Arc<dyn TagWriter>,
    transcoder: Transcoder,
}

impl ContainerTitleReader {
    /// Create a reader from the tag collaborator and the transcoder front-end.
    pub fn new(tags: Arc<dyn TagWriter>, transcoder: Transcoder) -> Self {
        Self { tags, transcoder }
    }
}

#[async_trait]
impl TitleReader for ContainerTitleReader {
    async fn read_title(&self, path: &Path, format: MediaFormat) -> Result<Option<String>> {
        match format {
            MediaFormat::Mp3 => Ok(read_tags(Arc::clone(&self.tags), path.to_path_buf())
                .await?
                .map(|record| record.title)
                .filter(|t| !t.trim().is_empty())),
            MediaFormat::Mp4 => self.transcoder.probe_title(path).await,
        }
    }
}

/// Outcome counts of one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    /// Files renamed.
    pub renamed: usize,
    /// Files left with their current name.
    pub unchanged: usize,
    /// Files that could not be read or renamed.
    pub failed: usize,
}

/// Rename every media file in `dir` after its embedded title.
///
/// # Errors
///
/// Returns an error only when `dir` itself cannot be listed.
pub async fn normalize_filenames(dir: &Path, reader: &dyn TitleReader) -> Result<NormalizeReport> {
    if !dir.is_dir() {
        return Err(Error::FileSystem(FileSystemError::NotFound {
            path: dir.to_path_buf(),
        }));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let format = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(MediaFormat::from_extension);
        if let Some(format) = format {
            files.push((entry.into_path(), format));
        }
    }
    info!("Scanning {} media files in {}", files.len(), dir.display());

    let mut report = NormalizeReport::default();
    for (path, format) in files {
        match normalize_file(dir, &path, format, reader).await {
            Ok(true) => report.renamed += 1,
            Ok(false) => report.unchanged += 1,
            Err(e) => {
                warn!("Could not normalize {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }
    debug!("Normalization report: {:?}", report);
    Ok(report)
}

async fn normalize_file(
    dir: &Path,
    path: &Path,
    format: MediaFormat,
    reader: &dyn TitleReader,
) -> Result<bool> {
    let Some(title) = reader.read_title(path, format).await? else {
        debug!("No embedded title in {}", path.display());
        return Ok(false);
    };
    let stem = sanitize_title(&title);
    if stem.is_empty() {
        return Ok(false);
    }

    let Some(target) = unique_destination(dir, &stem, format.extension(), path) else {
        return Ok(false);
    };

    std::fs::rename(path, &target).map_err(|e| {
        Error::FileSystem(FileSystemError::RenameFailed {
            from: path.to_path_buf(),
            to: target.clone(),
            reason: e.to_string(),
        })
    })?;
    info!("Renamed {} -> {}", path.display(), target.display());
    Ok(true)
}

/// First free `<stem>.<ext>`, `<stem> (1).<ext>`, ... in `dir`.
///
/// Returns `None` when the first candidate not taken by another file is
/// `current` itself.
#[must_use]
pub fn unique_destination(dir: &Path, stem: &str, ext: &str, current: &Path) -> Option<PathBuf> {
    candidates(dir, stem, ext)
        .find(|candidate| candidate == current || !candidate.exists())
        .filter(|candidate| candidate != current)
}

/// First free `<stem>.<ext>`, `<stem> (1).<ext>`, ... in `dir`.
#[must_use]
pub fn next_free_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    candidates(dir, stem, ext)
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| dir.join(format!("{stem}.{ext}")))
}

fn candidates<'a>(dir: &'a Path, stem: &'a str, ext: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    (0usize..).map(move |counter| {
        let name = if counter == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem} ({counter}).{ext}")
        };
        dir.join(name)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::TagError;
    use crate::process::{MockProcessRunner, ProcessOutput};
    use crate::tags::{MockTagWriter, TagRecord};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Reader returning fixed titles keyed by current file name.
    fn reader_with(titles: &'static [(&'static str, Option<&'static str>)]) -> MockTitleReader {
        let mut reader = MockTitleReader::new();
        reader.expect_read_title().returning(move |path, _| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            Ok(titles
                .iter()
                .find(|(n, _)| *n == name)
                .and_then(|(_, t)| t.map(String::from)))
        });
        reader
    }

    #[tokio::test]
    async fn test_collision_gets_counter() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mp3");
        touch(dir.path(), "b.mp3");
        let reader = reader_with(&[("a.mp3", Some("Song")), ("b.mp3", Some("Song!"))]);

        let report = normalize_filenames(dir.path(), &reader).await.unwrap();

        assert_eq!(report.renamed, 2);
        assert_eq!(names(dir.path()), vec!["Song (1).mp3", "Song.mp3"]);
        // The first file in name order keeps the plain name.
        assert_eq!(
            std::fs::read(dir.path().join("Song.mp3")).unwrap(),
            b"a.mp3"
        );
    }

    #[tokio::test]
    async fn test_file_already_named_is_unchanged() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Song.mp3");
        let reader = reader_with(&[("Song.mp3", Some("Song"))]);

        let report = normalize_filenames(dir.path(), &reader).await.unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.renamed, 0);
        assert_eq!(names(dir.path()), vec!["Song.mp3"]);
    }

    #[tokio::test]
    async fn test_untitled_and_foreign_files_are_left_alone() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "x.mp4");
        touch(dir.path(), "notes.txt");
        std::fs::create_dir(dir.path().join("sub.mp3")).unwrap();
        let reader = reader_with(&[("x.mp4", None)]);

        let report = normalize_filenames(dir.path(), &reader).await.unwrap();

        assert_eq!(report, NormalizeReport {
            renamed: 0,
            unchanged: 1,
            failed: 0,
        });
        assert_eq!(names(dir.path()), vec!["notes.txt", "sub.mp3", "x.mp4"]);
    }

    #[tokio::test]
    async fn test_read_failure_does_not_stop_scan() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mp3");
        touch(dir.path(), "b.mp3");

        let mut reader = MockTitleReader::new();
        reader.expect_read_title().returning(|path, _| {
            if path.ends_with("a.mp3") {
                Err(Error::Tag(TagError::ReadFailed {
                    path: path.to_path_buf(),
                    reason: "corrupt".to_string(),
                }))
            } else {
                Ok(Some("Other".to_string()))
            }
        });

        let report = normalize_filenames(dir.path(), &reader).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.renamed, 1);
        assert_eq!(names(dir.path()), vec!["Other.mp3", "a.mp3"]);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let reader = MockTitleReader::new();
        let err = normalize_filenames(Path::new("/no/such/dir"), &reader)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FileSystem(FileSystemError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unique_destination_skips_own_name() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Song.mp3");
        let own = touch(dir.path(), "Song (1).mp3");
        assert_eq!(unique_destination(dir.path(), "Song", "mp3", &own), None);

        let other = dir.path().join("z.mp3");
        assert_eq!(
            unique_destination(dir.path(), "Song", "mp3", &other),
            Some(dir.path().join("Song (2).mp3"))
        );
        assert_eq!(
            next_free_path(dir.path(), "Song", "mp3"),
            dir.path().join("Song (2).mp3")
        );
        assert_eq!(
            next_free_path(dir.path(), "Fresh", "mp4"),
            dir.path().join("Fresh.mp4")
        );
    }

    #[tokio::test]
    async fn test_container_reader_dispatches_by_format() {
        let mut tags = MockTagWriter::new();
        tags.expect_read().returning(|_| {
            Ok(Some(TagRecord {
                title: "Audio Title".to_string(),
                ..Default::default()
            }))
        });
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(ProcessOutput::success(
                r#"{"format":{"tags":{"title":"Video Title"}}}"#,
            ))
        });
        let transcoder = Transcoder::new(Arc::new(runner), "ffmpeg", "ffprobe");
        let reader = ContainerTitleReader::new(Arc::new(tags), transcoder);

        assert_eq!(
            reader
                .read_title(Path::new("a.mp3"), MediaFormat::Mp3)
                .await
                .unwrap()
                .as_deref(),
            Some("Audio Title")
        );
        assert_eq!(
            reader
                .read_title(Path::new("b.mp4"), MediaFormat::Mp4)
                .await
                .unwrap()
                .as_deref(),
            Some("Video Title")
        );
    }
}

//! Temporary per-attempt files.
//!
//! [`StagingArtifacts`] hands out unique paths for the staged audio and the
//! thumbnail of one download attempt and removes whatever exists at those
//! paths when it is dropped, on success and failure alike. Partial files the
//! extractor leaves next to the staged audio (`.part`, `.ytdl`, pre-conversion
//! containers) share its stem and are removed with it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, FileSystemError, Result};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Staging paths owned by one pipeline invocation.
#[derive(Debug)]
pub struct StagingArtifacts {
    audio: PathBuf,
    thumbnail: PathBuf,
}

impl StagingArtifacts {
    /// Allocate fresh staging paths inside `dir`.
    ///
    /// Names carry a millisecond timestamp plus a process-wide sequence
    /// number, so rapid or concurrent attempts never share a path.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created.
    pub fn allocate(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::FileSystem(FileSystemError::CreateDirFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })
        })?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let stamp = format!("{millis}_{seq}");

        let artifacts = Self {
            audio: dir.join(format!("temp_audio_{stamp}.m4a")),
            thumbnail: dir.join(format!("thumbnail_{stamp}.jpg")),
        };
        debug!(
            "Allocated staging paths {} and {}",
            artifacts.audio.display(),
            artifacts.thumbnail.display()
        );
        Ok(artifacts)
    }

    /// Path for the staged audio download.
    #[must_use]
    pub fn audio(&self) -> &Path {
        &self.audio
    }

    /// Path for the downloaded thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> &Path {
        &self.thumbnail
    }

    /// Remove staged files that exist; failures are logged.
    pub fn cleanup(&self) {
        let mut paths = vec![self.audio.clone(), self.thumbnail.clone()];
        paths.extend(self.audio_siblings());
        for path in paths {
            if !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed staging file {}", path.display()),
                Err(e) => warn!(
                    "{}",
                    FileSystemError::DeleteFailed {
                        path,
                        reason: e.to_string(),
                    }
                ),
            }
        }
    }

    /// Other files named `<audio stem>.*` in the staging directory.
    fn audio_siblings(&self) -> Vec<PathBuf> {
        let (Some(dir), Some(stem)) = (self.audio.parent(), self.audio.file_stem()) else {
            return Vec::new();
        };
        let prefix = format!("{}.", stem.to_string_lossy());

        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                path != &self.audio
                    && path
                        .file_name()
                        .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
            })
            .collect()
    }
}

impl Drop for StagingArtifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_unique() {
        let dir = TempDir::new().unwrap();
        let a = StagingArtifacts::allocate(dir.path()).unwrap();
        let b = StagingArtifacts::allocate(dir.path()).unwrap();
        assert_ne!(a.audio(), b.audio());
        assert_ne!(a.thumbnail(), b.thumbnail());
        assert!(a.audio().starts_with(dir.path()));
        assert_eq!(a.audio().extension().unwrap(), "m4a");
        assert_eq!(a.thumbnail().extension().unwrap(), "jpg");
    }

    #[test]
    fn test_drop_removes_existing_files() {
        let dir = TempDir::new().unwrap();
        let (audio, thumbnail) = {
            let staging = StagingArtifacts::allocate(dir.path()).unwrap();
            std::fs::write(staging.audio(), b"audio").unwrap();
            std::fs::write(staging.thumbnail(), b"image").unwrap();
            (staging.audio().to_path_buf(), staging.thumbnail().to_path_buf())
        };
        assert!(!audio.exists());
        assert!(!thumbnail.exists());
    }

    #[test]
    fn test_drop_with_missing_files_is_quiet() {
        let dir = TempDir::new().unwrap();
        let staging = StagingArtifacts::allocate(dir.path()).unwrap();
        std::fs::write(staging.audio(), b"audio").unwrap();
        drop(staging);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_partial_downloads() {
        let dir = TempDir::new().unwrap();
        let other = StagingArtifacts::allocate(dir.path()).unwrap();
        std::fs::write(other.audio(), b"other").unwrap();

        let staging = StagingArtifacts::allocate(dir.path()).unwrap();
        let stem = staging.audio().file_stem().unwrap().to_string_lossy().to_string();
        for suffix in ["m4a.part", "m4a.ytdl", "temp.m4a", "webm"] {
            std::fs::write(dir.path().join(format!("{stem}.{suffix}")), b"partial").unwrap();
        }
        drop(staging);

        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(left, vec![other.audio().to_path_buf()]);
    }

    #[test]
    fn test_allocate_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("staging").join("musicyt");
        let staging = StagingArtifacts::allocate(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(staging.audio().starts_with(&nested));
    }
}

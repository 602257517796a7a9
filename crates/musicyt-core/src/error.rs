//! Error types for MusicYT core operations.
//!
//! Errors are grouped per domain (process, download, tag, file system) and
//! wrapped by the crate-wide [`Error`]. [`Error::kind`] projects any error
//! onto the coarse taxonomy the pipelines use to decide whether a failure
//! aborts an invocation, fails a single playlist entry, or is swallowed.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while running an external executable.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable could not be started (missing binary, permissions).
    #[error("Failed to start {program}: {reason}")]
    Spawn {
        /// Program that was being started.
        program: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The executable ran but exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", exit_code_label(.exit_code))]
    NonZeroExit {
        /// Program that failed.
        program: PathBuf,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Captured standard error, used as the diagnostic payload.
        stderr: String,
    },

    /// The child's output pipes could not be captured.
    #[error("Failed to capture output of {program}: {reason}")]
    Io {
        /// Program whose pipes failed.
        program: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}

#[allow(clippy::ref_option)]
fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
}

/// Errors raised by the download stages.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Metadata for a URL could not be retrieved or understood.
    #[error("Failed to fetch media information for {url}: {reason}")]
    MetadataFetch {
        /// URL being resolved.
        url: String,
        /// Underlying diagnostic text.
        reason: String,
    },

    /// The thumbnail image could not be fetched.
    #[error("Failed to fetch thumbnail {url}: {reason}")]
    Thumbnail {
        /// Thumbnail URL.
        url: String,
        /// Underlying reason.
        reason: String,
    },

    /// The operation was cancelled while in flight.
    #[error("Download cancelled")]
    Cancelled,
}

/// Errors raised by the tag writer.
#[derive(Debug, Error)]
pub enum TagError {
    /// Writing tags to a finished file failed.
    #[error("Failed to write tags to {path}: {reason}")]
    WriteFailed {
        /// File being tagged.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Reading tags from a file failed.
    #[error("Failed to read tags from {path}: {reason}")]
    ReadFailed {
        /// File being read.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}

/// File system errors.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Path does not exist.
    #[error("Path not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Reading a file or directory failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Writing a file failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Creating a directory failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory being created.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Deleting a file failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path being deleted.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Renaming a file failed.
    #[error("Failed to rename {from} to {to}: {reason}")]
    RenameFailed {
        /// Original path.
        from: PathBuf,
        /// Target path.
        to: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}

/// Errors that can occur in MusicYT core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// External process failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Download stage failure.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Tag read/write failure.
    #[error(transparent)]
    Tag(#[from] TagError),

    /// File system failure.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error classes that drive propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Binary missing or unlaunchable; fatal to the invocation.
    Spawn,
    /// Non-zero exit from the extractor or transcoder; fatal to the current item.
    Process,
    /// Metadata retrieval failed.
    Fetch,
    /// Thumbnail fetch failed; degrades gracefully.
    NetworkTransient,
    /// Tag write failed; logged only.
    TagWrite,
    /// Temp cleanup or rename failed; logged only.
    FileSystem,
    /// The user cancelled the operation.
    Cancelled,
    /// Anything else.
    Other,
}

impl Error {
    /// Classify this error for propagation decisions.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Process(ProcessError::Spawn { .. }) => ErrorKind::Spawn,
            Self::Process(_) => ErrorKind::Process,
            Self::Download(DownloadError::MetadataFetch { .. }) => ErrorKind::Fetch,
            Self::Download(DownloadError::Thumbnail { .. }) => ErrorKind::NetworkTransient,
            Self::Download(DownloadError::Cancelled) => ErrorKind::Cancelled,
            Self::Tag(_) => ErrorKind::TagWrite,
            Self::FileSystem(_) | Self::Io(_) => ErrorKind::FileSystem,
            Self::Configuration(_) | Self::Serialization(_) => ErrorKind::Other,
        }
    }

    /// Whether this error represents a user cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }

    /// Create a metadata fetch error.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download(DownloadError::MetadataFetch {
            url: url.into(),
            reason: reason.into(),
        })
    }

    /// The underlying diagnostic text, without program names, URLs or paths.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Process(
                ProcessError::Spawn { reason, .. } | ProcessError::Io { reason, .. },
            )
            | Self::Download(
                DownloadError::MetadataFetch { reason, .. }
                | DownloadError::Thumbnail { reason, .. },
            )
            | Self::Tag(TagError::WriteFailed { reason, .. } | TagError::ReadFailed { reason, .. })
            | Self::FileSystem(
                FileSystemError::ReadFailed { reason, .. }
                | FileSystemError::WriteFailed { reason, .. }
                | FileSystemError::CreateDirFailed { reason, .. }
                | FileSystemError::DeleteFailed { reason, .. }
                | FileSystemError::RenameFailed { reason, .. },
            )
            | Self::Configuration(reason) => reason.clone(),
            Self::Process(ProcessError::NonZeroExit { stderr, .. }) => stderr.clone(),
            Self::Download(DownloadError::Cancelled) => "Download cancelled".to_string(),
            Self::FileSystem(FileSystemError::NotFound { .. }) => "Path not found".to_string(),
            Self::Io(e) => e.to_string(),
            Self::Serialization(e) => e.to_string(),
        }
    }

    /// Create a thumbnail fetch error.
    pub fn thumbnail(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download(DownloadError::Thumbnail {
            url: url.into(),
            reason: reason.into(),
        })
    }
}

//! ID3 tag writing for finished MP3 files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Datelike;
use id3::frame::{Comment, Picture, PictureType};
use id3::{Tag, TagLike, Version};
use tracing::{debug, warn};

use crate::error::{Error, Result, TagError};
use crate::media::MediaInfo;
use crate::thumbnail::sniff_image_mime;

/// Artist used when the uploader is unknown.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Album used for single downloads without album information.
pub const DEFAULT_ALBUM: &str = "YouTube Download";

/// Description given to embedded cover images.
pub const COVER_DESCRIPTION: &str = "Cover";

/// Role of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverKind {
    /// Front cover (ID3 picture type 3).
    FrontCover,
    /// Any other picture type.
    Other,
}

impl From<CoverKind> for PictureType {
    fn from(kind: CoverKind) -> Self {
        match kind {
            CoverKind::FrontCover => Self::CoverFront,
            CoverKind::Other => Self::Other,
        }
    }
}

impl From<PictureType> for CoverKind {
    fn from(kind: PictureType) -> Self {
        match kind {
            PictureType::CoverFront => Self::FrontCover,
            _ => Self::Other,
        }
    }
}

/// An embedded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime: String,
    /// Picture role.
    pub kind: CoverKind,
    /// Free-form description.
    pub description: String,
}

impl CoverImage {
    /// Build a front cover from image bytes, sniffing the MIME type.
    #[must_use]
    pub fn front_cover(data: Vec<u8>) -> Self {
        Self {
            mime: sniff_image_mime(&data).to_string(),
            data,
            kind: CoverKind::FrontCover,
            description: COVER_DESCRIPTION.to_string(),
        }
    }
}

/// Tags written into a finished audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRecord {
    /// Track title.
    pub title: String,
    /// Artist.
    pub artist: String,
    /// Album.
    pub album: String,
    /// Four-digit year.
    pub year: String,
    /// Optional comment.
    pub comment: Option<String>,
    /// Optional cover art.
    pub image: Option<CoverImage>,
}

impl TagRecord {
    /// Build a record for a downloaded item.
    ///
    /// Missing fields fall back to [`UNKNOWN_ARTIST`], `album_fallback` and the
    /// current year; the comment records the source URL.
    #[must_use]
    pub fn from_media(info: &MediaInfo, source_url: &str, album_fallback: &str) -> Self {
        Self {
            title: info.title.clone(),
            artist: info
                .uploader
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: info
                .album
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| album_fallback.to_string()),
            year: info
                .upload_year()
                .unwrap_or_else(|| chrono::Local::now().year().to_string()),
            comment: Some(format!("Downloaded from: {source_url}")),
            image: None,
        }
    }

    /// Attach cover art.
    #[must_use]
    pub fn with_image(mut self, image: CoverImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Reads and writes tags in audio files.
#[cfg_attr(test, mockall::automock)]
pub trait TagWriter: Send + Sync {
    /// Write `record` into the file at `path`.
    fn write(&self, path: &Path, record: &TagRecord) -> Result<()>;

    /// Read the tags of the file at `path`; `None` when it has none.
    fn read(&self, path: &Path) -> Result<Option<TagRecord>>;
}

/// [`TagWriter`] producing ID3v2.4 tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3TagWriter;

impl Id3TagWriter {
    /// Create a new writer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TagWriter for Id3TagWriter {
    fn write(&self, path: &Path, record: &TagRecord) -> Result<()> {
        let write_error = |reason: String| {
            Error::Tag(TagError::WriteFailed {
                path: path.to_path_buf(),
                reason,
            })
        };

        // Keep whatever the transcoder already wrote (encoder frames).
        let mut tag = match Tag::read_from_path(path) {
            Ok(tag) => tag,
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => Tag::new(),
            Err(e) => {
                warn!("Replacing unreadable tag in {}: {}", path.display(), e);
                Tag::new()
            }
        };

        tag.set_title(record.title.as_str());
        tag.set_artist(record.artist.as_str());
        tag.set_album(record.album.as_str());
        tag.set_text("TDRC", record.year.as_str());

        tag.remove_comment(None, None);
        if let Some(text) = &record.comment {
            tag.add_frame(Comment {
                lang: "eng".to_string(),
                description: String::new(),
                text: text.clone(),
            });
        }

        if let Some(image) = &record.image {
            tag.remove_picture_by_type(image.kind.into());
            tag.add_frame(Picture {
                mime_type: image.mime.clone(),
                picture_type: image.kind.into(),
                description: image.description.clone(),
                data: image.data.clone(),
            });
        }

        tag.write_to_path(path, Version::Id3v24)
            .map_err(|e| write_error(e.to_string()))?;
        debug!("Wrote tags to {}", path.display());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<TagRecord>> {
        let tag = match Tag::read_from_path(path) {
            Ok(tag) => tag,
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => {
                debug!("No ID3 tag found in: {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Tag(TagError::ReadFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }));
            }
        };

        let year = tag
            .get("TDRC")
            .and_then(|frame| frame.content().text())
            .map(String::from)
            .or_else(|| tag.year().map(|y| y.to_string()))
            .unwrap_or_default();

        Ok(Some(TagRecord {
            title: tag.title().unwrap_or_default().to_string(),
            artist: tag.artist().unwrap_or_default().to_string(),
            album: tag.album().unwrap_or_default().to_string(),
            year,
            comment: tag.comments().next().map(|c| c.text.clone()),
            image: tag.pictures().next().map(|p| CoverImage {
                data: p.data.clone(),
                mime: p.mime_type.clone(),
                kind: p.picture_type.into(),
                description: p.description.clone(),
            }),
        }))
    }
}


/// Write `record` into `path` on the blocking pool.
///
/// # Errors
///
/// Returns the writer's error, or a write failure if the task panicked.
pub async fn write_tags(
    tags: Arc<dyn TagWriter>,
    path: PathBuf,
    record: TagRecord,
) -> Result<()> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || tags.write(&target, &record))
        .await
        .map_err(|e| {
            Error::Tag(TagError::WriteFailed {
                path,
                reason: e.to_string(),
            })
        })?
}

/// Read the tags of `path` on the blocking pool.
///
/// # Errors
///
/// Returns the reader's error, or a read failure if the task panicked.
pub async fn read_tags(tags: Arc<dyn TagWriter>, path: PathBuf) -> Result<Option<TagRecord>> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || tags.read(&target))
        .await
        .map_err(|e| {
            Error::Tag(TagError::ReadFailed {
                path,
                reason: e.to_string(),
            })
        })?
}

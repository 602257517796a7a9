//! Request and media metadata types.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Output format of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// Audio transcoded to MP3 with ID3 tags and cover art.
    Mp3,
    /// Merged best video and audio in an MP4 container.
    Mp4,
}

impl MediaFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
        }
    }

    /// Match a file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim())
            .ok_or_else(|| Error::Configuration(format!("Unsupported format: {s}")))
    }
}

/// A download request issued by the presentation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,
    /// Target format.
    pub format: MediaFormat,
    /// Whether the URL is a playlist to iterate.
    pub is_playlist: bool,
}

impl DownloadRequest {
    /// Create a request for a single item.
    pub fn single(url: impl Into<String>, format: MediaFormat) -> Self {
        Self {
            url: url.into(),
            format,
            is_playlist: false,
        }
    }

    /// Create a request for a whole playlist.
    pub fn playlist(url: impl Into<String>, format: MediaFormat) -> Self {
        Self {
            url: url.into(),
            format,
            is_playlist: true,
        }
    }
}

/// Metadata the extractor reports for one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Item identifier.
    #[serde(default)]
    pub id: String,
    /// Item title.
    #[serde(default)]
    pub title: String,
    /// Uploader / channel name.
    #[serde(default)]
    pub uploader: Option<String>,
    /// Thumbnail image URL.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Album, when the source knows one.
    #[serde(default)]
    pub album: Option<String>,
    /// Upload date as `YYYYMMDD`.
    #[serde(default)]
    pub upload_date: Option<String>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Selected format description.
    #[serde(default)]
    pub format: Option<String>,
    /// Canonical page URL.
    #[serde(default)]
    pub webpage_url: Option<String>,
}

impl MediaInfo {
    /// Four-digit release year taken from the upload date.
    #[must_use]
    pub fn upload_year(&self) -> Option<String> {
        let date = self.upload_date.as_deref()?;
        let year = date.get(..4)?;
        year.chars()
            .all(|c| c.is_ascii_digit())
            .then(|| year.to_string())
    }
}

/// Shallow entry of a flat playlist listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Item identifier.
    pub id: String,
    /// Title, when the listing carries one.
    #[serde(default)]
    pub title: Option<String>,
    /// Item URL, when the listing carries one.
    #[serde(default)]
    pub url: Option<String>,
}

/// Flat playlist listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistManifest {
    /// Playlist title.
    #[serde(default)]
    pub title: Option<String>,
    /// Entries in playlist order.
    #[serde(default, deserialize_with = "skip_null_entries")]
    pub entries: Vec<PlaylistEntry>,
}

impl PlaylistManifest {
    /// Playlist title with a generic fallback.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Playlist")
    }
}

/// The extractor emits `null` for entries it cannot list (deleted videos).
fn skip_null_entries<'de, D>(deserializer: D) -> Result<Vec<PlaylistEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<Option<PlaylistEntry>>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}

static UNSAFE_TITLE_CHARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").ok());

/// Strip every character outside word, whitespace and hyphen classes, then trim.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let stripped = match UNSAFE_TITLE_CHARS.as_ref() {
        Some(re) => re.replace_all(title, "").into_owned(),
        None => title
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace() || *c == '-')
            .collect(),
    };
    stripped.trim().to_string()
}

/// Sanitize a title, falling back when nothing usable remains.
#[must_use]
pub fn sanitize_title_or(title: &str, fallback: &str) -> String {
    let sanitized = sanitize_title(title);
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}

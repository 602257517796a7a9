//! Destination selection at the presentation boundary.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::media::{MediaFormat, sanitize_title_or};

/// Asks the user where output should go.
///
/// Returning `None` means the user declined, which cancels the download.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DestinationPrompt: Send + Sync {
    /// Choose the output file of a single download.
    async fn choose_file(&self, suggested_name: &str, format: MediaFormat) -> Option<PathBuf>;

    /// Choose the output folder of a playlist download.
    async fn choose_folder(&self, playlist_title: &str) -> Option<PathBuf>;
}

/// Non-interactive prompt answering under a fixed directory.
///
/// Playlists get a subfolder named after them, like the interactive suggestion.
#[derive(Debug, Clone)]
pub struct FixedDestination {
    directory: PathBuf,
}

impl FixedDestination {
    /// Save everything under `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl DestinationPrompt for FixedDestination {
    async fn choose_file(&self, suggested_name: &str, _format: MediaFormat) -> Option<PathBuf> {
        Some(self.directory.join(suggested_name))
    }

    async fn choose_folder(&self, playlist_title: &str) -> Option<PathBuf> {
        Some(self.directory.join(sanitize_title_or(playlist_title, "Playlist")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_destination() {
        let prompt = FixedDestination::new("/music");
        assert_eq!(
            prompt.choose_file("Song.mp3", MediaFormat::Mp3).await,
            Some(PathBuf::from("/music/Song.mp3"))
        );
        assert_eq!(
            prompt.choose_folder("Mix").await,
            Some(PathBuf::from("/music/Mix"))
        );
    }

    #[tokio::test]
    async fn test_fixed_destination_sanitizes_playlist_folder() {
        let prompt = FixedDestination::new("/music");
        assert_eq!(
            prompt.choose_folder("Road Trip: 2024!").await,
            Some(PathBuf::from("/music/Road Trip 2024"))
        );
        assert_eq!(
            prompt.choose_folder("???").await,
            Some(PathBuf::from("/music/Playlist"))
        );
    }
}

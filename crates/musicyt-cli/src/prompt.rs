//! Terminal destination prompt.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use musicyt_core::DestinationPrompt;
use musicyt_core::media::{MediaFormat, sanitize_title_or};
use tracing::warn;

/// Answers that decline the destination.
const DECLINE_ANSWERS: [&str; 4] = ["q", "n", "no", "quit"];

/// Asks for destinations on stderr and reads the answer from stdin.
///
/// Pressing Enter accepts the suggestion under the download directory,
/// typing a path overrides it and `q` declines.
#[derive(Debug, Clone)]
pub struct TerminalPrompt {
    download_dir: PathBuf,
    auto_accept: bool,
}

impl TerminalPrompt {
    /// Suggest destinations under `download_dir`.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            auto_accept: false,
        }
    }

    /// Take every suggestion without asking.
    #[must_use]
    pub const fn with_auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    /// Suggested file for a single download.
    pub fn suggested_file(&self, suggested_name: &str) -> PathBuf {
        self.download_dir.join(suggested_name)
    }

    /// Suggested folder for a playlist, named after it.
    pub fn suggested_folder(&self, playlist_title: &str) -> PathBuf {
        self.download_dir
            .join(sanitize_title_or(playlist_title, "Playlist"))
    }
}

#[async_trait]
impl DestinationPrompt for TerminalPrompt {
    async fn choose_file(&self, suggested_name: &str, format: MediaFormat) -> Option<PathBuf> {
        let suggested = self.suggested_file(suggested_name);
        if self.auto_accept {
            return Some(suggested);
        }
        let question = format!(
            "Save {} file as [{}] (q to cancel): ",
            format.extension().to_uppercase(),
            suggested.display()
        );
        let answer = ask(question).await?;
        interpret_file_answer(&answer, &suggested, format)
    }

    async fn choose_folder(&self, playlist_title: &str) -> Option<PathBuf> {
        let suggested = self.suggested_folder(playlist_title);
        if self.auto_accept {
            return Some(suggested);
        }
        let question = format!(
            "Save playlist \"{playlist_title}\" into [{}] (q to cancel): ",
            suggested.display()
        );
        let answer = ask(question).await?;
        interpret_answer(&answer, &suggested)
    }
}

/// Print `question` and read one line without blocking the runtime.
async fn ask(question: String) -> Option<String> {
    let read = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(question.as_bytes())?;
        stderr.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(line)
    })
    .await;

    match read {
        Ok(Ok(line)) => Some(line),
        Ok(Err(e)) => {
            warn!("Failed to read destination: {}", e);
            None
        }
        Err(e) => {
            warn!("Destination prompt task failed: {}", e);
            None
        }
    }
}

/// Empty accepts `suggested`, a decline word returns `None`, anything else
/// is the chosen path.
pub fn interpret_answer(answer: &str, suggested: &Path) -> Option<PathBuf> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Some(suggested.to_path_buf());
    }
    if DECLINE_ANSWERS
        .iter()
        .any(|d| answer.eq_ignore_ascii_case(d))
    {
        return None;
    }
    Some(PathBuf::from(answer))
}

/// Like [`interpret_answer`]; a directory keeps the suggested file name and a
/// path without extension gets the format's.
pub fn interpret_file_answer(
    answer: &str,
    suggested: &Path,
    format: MediaFormat,
) -> Option<PathBuf> {
    let chosen = interpret_answer(answer, suggested)?;
    if chosen.is_dir() {
        return Some(match suggested.file_name() {
            Some(name) => chosen.join(name),
            None => chosen,
        });
    }
    if chosen.extension().is_none() {
        return Some(chosen.with_extension(format.extension()));
    }
    Some(chosen)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_answer_accepts_suggestion() {
        let suggested = Path::new("/music/Song.mp3");
        assert_eq!(
            interpret_answer("\n", suggested),
            Some(suggested.to_path_buf())
        );
    }

    #[test]
    fn test_decline_answers() {
        let suggested = Path::new("/music/Song.mp3");
        for answer in ["q", "Q\n", " no ", "quit"] {
            assert_eq!(interpret_answer(answer, suggested), None, "{answer:?}");
        }
    }

    #[test]
    fn test_custom_path_answer() {
        assert_eq!(
            interpret_answer("/tmp/other.mp3\n", Path::new("/music/Song.mp3")),
            Some(PathBuf::from("/tmp/other.mp3"))
        );
    }

    #[test]
    fn test_file_answer_adds_extension() {
        assert_eq!(
            interpret_file_answer("/nonexistent/take2", Path::new("/m/Song.mp4"), MediaFormat::Mp4),
            Some(PathBuf::from("/nonexistent/take2.mp4"))
        );
    }

    #[test]
    fn test_file_answer_directory_keeps_name() {
        let dir = TempDir::new().unwrap();
        let answer = dir.path().to_string_lossy().to_string();
        assert_eq!(
            interpret_file_answer(&answer, Path::new("/m/Song.mp3"), MediaFormat::Mp3),
            Some(dir.path().join("Song.mp3"))
        );
    }

    #[tokio::test]
    async fn test_auto_accept_uses_suggestions() {
        let prompt = TerminalPrompt::new("/music").with_auto_accept(true);
        assert_eq!(
            prompt.choose_file("Song.mp3", MediaFormat::Mp3).await,
            Some(PathBuf::from("/music/Song.mp3"))
        );
        assert_eq!(
            prompt.choose_folder("Mix").await,
            Some(PathBuf::from("/music/Mix"))
        );
    }

    #[test]
    fn test_suggestions() {
        let prompt = TerminalPrompt::new("/music");
        assert_eq!(
            prompt.suggested_file("Song.mp3"),
            PathBuf::from("/music/Song.mp3")
        );
        assert_eq!(
            prompt.suggested_folder("Road Trip: 2024!"),
            PathBuf::from("/music/Road Trip 2024")
        );
        assert_eq!(
            prompt.suggested_folder("???"),
            PathBuf::from("/music/Playlist")
        );
    }
}

//! Rendering of pipeline events on stdout.

use std::io::{self, Write};

use musicyt_core::ProgressEvent;
use tracing::warn;

/// Width of the text progress bar.
const BAR_WIDTH: usize = 30;

/// Turns [`ProgressEvent`]s into terminal text or JSON lines.
#[derive(Debug, Default)]
pub struct Renderer {
    json: bool,
    // A percent bar was drawn without a trailing newline.
    bar_open: bool,
}

impl Renderer {
    /// Human-readable output.
    pub fn text() -> Self {
        Self::default()
    }

    /// One JSON object per event.
    pub fn json() -> Self {
        Self {
            json: true,
            bar_open: false,
        }
    }

    /// Format one event, including its line terminator.
    pub fn render(&mut self, event: &ProgressEvent) -> String {
        if self.json {
            return match serde_json::to_string(event) {
                Ok(line) => line + "\n",
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    String::new()
                }
            };
        }

        if let ProgressEvent::Percent { percent } = event {
            self.bar_open = true;
            return format!("\r{}", progress_bar(*percent));
        }

        let mut out = String::new();
        if std::mem::take(&mut self.bar_open) {
            out.push('\n');
        }
        match event {
            ProgressEvent::Completed { path } => {
                out.push_str(&format!("✓ Download complete! Saved to: {}", path.display()));
            }
            ProgressEvent::Error { message } => out.push_str(&format!("✗ Error: {message}")),
            other => out.push_str(&other.to_string()),
        }
        out.push('\n');
        out
    }

    /// Render and write to stdout.
    pub fn print(&mut self, event: &ProgressEvent) {
        let text = self.render(event);
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            warn!("Failed to write output: {}", e);
        }
    }

    /// Close a pending progress bar.
    pub fn finish(&mut self) {
        if std::mem::take(&mut self.bar_open) {
            println!();
        }
    }
}

/// `[#####-----]  50%`
fn progress_bar(percent: u8) -> String {
    let percent = percent.min(100);
    let filled = BAR_WIDTH * usize::from(percent) / 100;
    format!(
        "[{}{}] {percent:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), format!("[{}]   0%", "-".repeat(30)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(30)));
        assert!(progress_bar(50).starts_with(&format!("[{}-", "#".repeat(15))));
    }

    #[test]
    fn test_text_messages() {
        let mut renderer = Renderer::text();
        assert_eq!(
            renderer.render(&ProgressEvent::Status {
                message: "Downloading audio...".to_string()
            }),
            "Downloading audio...\n"
        );
        assert_eq!(
            renderer.render(&ProgressEvent::Completed {
                path: PathBuf::from("/music/Song.mp3")
            }),
            "✓ Download complete! Saved to: /music/Song.mp3\n"
        );
        assert_eq!(
            renderer.render(&ProgressEvent::Error {
                message: "This video is unavailable or private.".to_string()
            }),
            "✗ Error: This video is unavailable or private.\n"
        );
        assert_eq!(
            renderer.render(&ProgressEvent::Cancelled),
            "Download cancelled\n"
        );
    }

    #[test]
    fn test_percent_line_is_closed_by_next_message() {
        let mut renderer = Renderer::text();
        let bar = renderer.render(&ProgressEvent::Percent { percent: 40 });
        assert!(bar.starts_with('\r'));
        assert!(!bar.ends_with('\n'));

        let next = renderer.render(&ProgressEvent::Status {
            message: "Processing video...".to_string(),
        });
        assert_eq!(next, "\nProcessing video...\n");
        assert!(!renderer.bar_open);
    }

    #[test]
    fn test_json_lines() {
        let mut renderer = Renderer::json();
        let line = renderer.render(&ProgressEvent::PlaylistItem {
            title: "Song".to_string(),
            current: 2,
            total: 5,
        });
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["kind"], "playlist_item");
        assert_eq!(value["current"], 2);
        assert_eq!(value["total"], 5);

        let percent = renderer.render(&ProgressEvent::Percent { percent: 7 });
        assert_eq!(percent, "{\"kind\":\"percent\",\"percent\":7}\n");
    }
}

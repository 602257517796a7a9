//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use musicyt_core::{DownloadRequest, MediaFormat};

use crate::logging::RotationPolicy;

/// Hosts accepted as download sources.
const SUPPORTED_HOSTS: [&str; 2] = ["youtube.com", "youtu.be"];

/// musicyt: download YouTube videos and playlists as tagged MP3 or MP4 files.
#[derive(Debug, Parser)]
#[command(name = "musicyt", version, about)]
pub struct Args {
    /// Video or playlist URL.
    pub url: String,

    /// Output format (mp3 or mp4).
    #[arg(short, long, default_value = "mp3")]
    pub format: MediaFormat,

    /// Download every entry of a playlist.
    #[arg(short, long)]
    pub playlist: bool,

    /// Save into this directory without asking; playlists get a subfolder.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Accept the suggested destination under the download directory.
    #[arg(short, long)]
    pub yes: bool,

    /// Print events as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Configuration file to use instead of the default location.
    #[arg(long, env = "MUSICYT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Rotate the diagnostic log.
    #[arg(long, value_enum, default_value_t = RotationPolicy::default())]
    pub log_rotation: RotationPolicy,

    /// Write the diagnostic log as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Increase console log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// The request to run, after checking the URL.
    pub fn request(&self) -> Result<DownloadRequest, String> {
        let url = validate_url(&self.url)?;
        Ok(if self.playlist {
            DownloadRequest::playlist(url, self.format)
        } else {
            DownloadRequest::single(url, self.format)
        })
    }

    /// Whether destinations are chosen without a prompt.
    pub const fn non_interactive(&self) -> bool {
        self.yes || self.output.is_some()
    }
}

/// Trimmed URL, or the message to show for a missing or foreign one.
pub fn validate_url(url: &str) -> Result<&str, String> {
    let url = url.trim();
    if url.is_empty() {
        return Err("Please enter a YouTube URL".to_string());
    }
    if !SUPPORTED_HOSTS.iter().any(|host| url.contains(host)) {
        return Err("Please enter a valid YouTube URL".to_string());
    }
    Ok(url)
}

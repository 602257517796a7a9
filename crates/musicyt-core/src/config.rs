//! Application configuration management.
//!
//! Handles loading and saving settings, and resolving the external binaries
//! the pipelines drive.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::thumbnail::DEFAULT_FETCH_TIMEOUT_SECS;

/// Default extractor executable name.
pub const DEFAULT_EXTRACTOR: &str = "yt-dlp";
/// Default transcoder executable name.
pub const DEFAULT_TRANSCODER: &str = "ffmpeg";
/// Default probe executable name.
pub const DEFAULT_PROBE: &str = "ffprobe";

const fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Explicit extractor binary; looked up on `PATH` when unset.
    #[serde(default)]
    pub extractor_path: Option<PathBuf>,
    /// Explicit transcoder binary; looked up on `PATH` when unset.
    #[serde(default)]
    pub transcoder_path: Option<PathBuf>,
    /// Explicit probe binary; looked up on `PATH` when unset.
    #[serde(default)]
    pub probe_path: Option<PathBuf>,
    /// Directory for staging files; the OS temp dir when unset.
    #[serde(default)]
    pub staging_directory: Option<PathBuf>,
    /// Where downloads go when no destination is given.
    #[serde(default = "default_download_directory")]
    pub download_directory: PathBuf,
    /// Directory holding the diagnostic log.
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    /// Timeout for thumbnail requests, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub thumbnail_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            extractor_path: None,
            transcoder_path: None,
            probe_path: None,
            staging_directory: None,
            download_directory: default_download_directory(),
            log_directory: default_log_directory(),
            thumbnail_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to read config file: {e}"),
            })
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;

        info!("Loaded config from {}", path.display());
        debug!(
            "Download directory: {}",
            config.download_directory.display()
        );
        Ok(config)
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: format!("Failed to create config directory: {e}"),
                })
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write config file: {e}"),
            })
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Directory used for staging files.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Get the default download directory.
#[must_use]
pub fn default_download_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default diagnostic log directory.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("musicyt")
        .join("logs")
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("musicyt")
        .join("config.json")
}

/// Resolved locations of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPaths {
    /// Extractor (`yt-dlp`).
    pub extractor: PathBuf,
    /// Transcoder (`ffmpeg`).
    pub transcoder: PathBuf,
    /// Probe (`ffprobe`).
    pub probe: PathBuf,
}

impl BinaryPaths {
    /// Resolve binaries from the config, falling back to a `PATH` lookup.
    ///
    /// Binaries that cannot be found keep their bare name so that the spawn
    /// error names the missing program.
    #[must_use]
    pub fn resolve(config: &AppConfig) -> Self {
        let paths = Self {
            extractor: resolve_binary(config.extractor_path.as_deref(), DEFAULT_EXTRACTOR),
            transcoder: resolve_binary(config.transcoder_path.as_deref(), DEFAULT_TRANSCODER),
            probe: resolve_binary(config.probe_path.as_deref(), DEFAULT_PROBE),
        };
        for (label, path) in [
            ("yt-dlp", &paths.extractor),
            ("ffmpeg", &paths.transcoder),
            ("ffprobe", &paths.probe),
        ] {
            if path.is_file() {
                info!("{} path: {} (found)", label, path.display());
            } else {
                warn!("{} path: {} (not found)", label, path.display());
            }
        }
        paths
    }
}

impl Default for BinaryPaths {
    fn default() -> Self {
        Self {
            extractor: PathBuf::from(DEFAULT_EXTRACTOR),
            transcoder: PathBuf::from(DEFAULT_TRANSCODER),
            probe: PathBuf::from(DEFAULT_PROBE),
        }
    }
}

fn resolve_binary(configured: Option<&Path>, name: &str) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    find_on_path(name).unwrap_or_else(|| PathBuf::from(name))
}

/// Search the `PATH` directories for an executable.
fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{name}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

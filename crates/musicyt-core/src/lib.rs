//! MusicYT Core Library
//!
//! This crate provides the download orchestration behind MusicYT:
//! - Running `yt-dlp`, `ffmpeg` and `ffprobe` with live progress
//! - Single-item and playlist pipelines producing tagged MP3 or MP4 files
//! - Staging file bookkeeping, cover art and ID3 tagging
//! - Post-download filename normalization

pub mod args;
pub mod classify;
pub mod config;
pub mod context;
pub mod destination;
pub mod error;
pub mod events;
pub mod extractor;
pub mod media;
pub mod normalizer;
pub mod pipeline;
pub mod process;
pub mod staging;
pub mod tags;
pub mod thumbnail;
pub mod transcoder;

pub use config::{AppConfig, BinaryPaths};
pub use context::AppContext;
pub use destination::{DestinationPrompt, FixedDestination};
pub use error::{Error, ErrorKind, Result};
pub use events::{BatchSummary, EventSink, ProgressEvent};
pub use media::{DownloadRequest, MediaFormat};
pub use pipeline::{DownloadOutcome, DownloadPipeline};

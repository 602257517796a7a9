//! musicyt: download YouTube videos and playlists as tagged MP3 or MP4 files.

mod cli;
mod logging;
mod prompt;
mod render;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use musicyt_core::{
    AppConfig, AppContext, DestinationPrompt, DownloadOutcome, DownloadPipeline, EventSink,
    FixedDestination,
};
use tracing::{error, info, warn};

use crate::cli::Args;
use crate::logging::{LogSettings, LoggingError};
use crate::prompt::TerminalPrompt;
use crate::render::Renderer;

/// Exit status after Ctrl-C.
const EXIT_CANCELLED: u8 = 130;
/// Exit status for bad arguments or configuration.
const EXIT_USAGE: u8 = 2;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Core(#[from] musicyt_core::Error),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(outcome) => exit_code(&outcome),
        Err(e) => {
            eprintln!("✗ Error: {e}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(args: Args) -> Result<DownloadOutcome, CliError> {
    let request = args.request().map_err(CliError::InvalidRequest)?;

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    let log_settings = LogSettings::for_verbosity(&config.log_directory, args.verbose)
        .rotation(args.log_rotation)
        .json(args.log_json);
    let _log_guard = logging::install(&log_settings)?;
    info!(
        "musicyt {} starting, diagnostic log at {}",
        env!("CARGO_PKG_VERSION"),
        log_settings.log_file().display()
    );

    let ctx = AppContext::from_config(&config)?;

    let prompt: Arc<dyn DestinationPrompt> = match &args.output {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(musicyt_core::Error::Io)?;
            Arc::new(FixedDestination::new(dir))
        }
        None => Arc::new(
            TerminalPrompt::new(&config.download_directory).with_auto_accept(args.non_interactive()),
        ),
    };

    let interrupt = tokio::spawn(cancel_on_interrupt(ctx.clone()));

    let (sink, mut events) = EventSink::channel();
    let pipeline = DownloadPipeline::new(ctx, prompt, sink);
    let download = tokio::spawn(async move { pipeline.run(&request).await });

    let mut renderer = if args.json {
        Renderer::json()
    } else {
        Renderer::text()
    };
    // Ends once the pipeline, and with it the sink, is dropped.
    while let Some(event) = events.recv().await {
        renderer.print(&event);
    }
    renderer.finish();
    interrupt.abort();

    let outcome = match download.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Download task failed: {}", e);
            DownloadOutcome::Failed(e.to_string())
        }
    };
    info!("Finished: {:?}", outcome);
    Ok(outcome)
}

/// First Ctrl-C cancels the running download, the second exits at once.
async fn cancel_on_interrupt(ctx: AppContext) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupted, cancelling download");
    ctx.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(i32::from(EXIT_CANCELLED));
    }
}

/// Playlists with failed entries exit with 1 even though the run finished.
fn exit_code(outcome: &DownloadOutcome) -> ExitCode {
    match outcome {
        DownloadOutcome::Saved(_) => ExitCode::SUCCESS,
        DownloadOutcome::PlaylistSaved { summary, .. } if summary.failed == 0 => {
            ExitCode::SUCCESS
        }
        DownloadOutcome::PlaylistSaved { .. } | DownloadOutcome::Failed(_) => ExitCode::FAILURE,
        DownloadOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
    }
}

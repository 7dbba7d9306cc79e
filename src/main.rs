use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunegrab::{AudioFormat, DownloadError, Downloader, FetchConfig, FetchResult, Mode, Outcome};

/// Download media items or whole playlists, optionally as audio.
#[derive(Parser)]
#[command(name = "tunegrab", version, about = "Search, download and transcode media")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Destination directory (default: ./downloads)
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// Items processed at once for playlists
    #[arg(long, short, global = true)]
    jobs: Option<usize>,

    /// Audio format: mp3, m4a, opus or flac
    #[arg(long, global = true)]
    format: Option<String>,

    /// Proxy URL (http, https or socks5)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Keep the sanitized title instead of slugifying file names
    #[arg(long, global = true)]
    no_rename: bool,

    /// Stop dispatching playlist items after the first failure
    #[arg(long, global = true)]
    fail_fast: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch audio only (URL, playlist URL or search text)
    Audio { input: String },

    /// Fetch the best video rendition
    Video { input: String },

    /// Show yt-dlp and ffmpeg status
    Tools,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunegrab=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> Result<FetchConfig, DownloadError> {
    let mut config = FetchConfig::from_env()?
        .with_rename(!cli.no_rename)
        .with_fail_fast(cli.fail_fast);

    if let Some(dir) = &cli.output {
        config = config.with_output_dir(dir);
    }
    if let Some(jobs) = cli.jobs {
        config = config.with_concurrency(jobs);
    }
    if let Some(format) = &cli.format {
        config = config.with_audio_format(format.parse::<AudioFormat>()?);
    }
    if cli.proxy.is_some() {
        config = config.with_proxy(cli.proxy.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<ExitCode, DownloadError> {
    let downloader = Downloader::new(build_config(&cli)?)?;

    let (mode, input) = match cli.command {
        Commands::Audio { input } => (Mode::Audio, input),
        Commands::Video { input } => (Mode::Video, input),
        Commands::Tools => {
            for tool in downloader.tool_status().await {
                match (&tool.path, &tool.version) {
                    (Some(path), version) => println!(
                        "{:<8} {} ({})",
                        tool.name,
                        path,
                        version.as_deref().unwrap_or("unknown version")
                    ),
                    (None, _) => println!("{:<8} not found", tool.name),
                }
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    // Ctrl-C stops dispatching new playlist items; running ones finish
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing items already in progress");
            on_interrupt.cancel();
        }
    });

    match downloader.download_with_cancel(&input, mode, cancel).await? {
        FetchResult::Single(path) => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        FetchResult::Collection(outcomes) => Ok(report(&outcomes)),
    }
}

fn report(outcomes: &[Outcome]) -> ExitCode {
    let mut failed = 0;
    for outcome in outcomes {
        match outcome {
            Outcome::Success { path, skipped, .. } => {
                let note = if *skipped { " (already present)" } else { "" };
                println!("{}{}", path.display(), note);
            }
            Outcome::Failure(failure) => {
                failed += 1;
                eprintln!("failed: {}", failure);
            }
        }
    }

    eprintln!("{} of {} items done, {} failed", outcomes.len() - failed, outcomes.len(), failed);
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

//! sxkcd-dl - xkcd comic downloader
//!
//! Fetches comics from xkcd, merges in explanations from explainxkcd, and
//! writes the JSON archive consumed by the search indexer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sxkcd_common::config::ConfigResolver;
use sxkcd_common::Comic;
use sxkcd_dl::archive::download_all;
use sxkcd_dl::{ArchiveSink, ComicId, DownloadSettings, Watcher, XkcdClient};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Command-line arguments for sxkcd-dl
#[derive(Parser, Debug)]
#[command(name = "sxkcd-dl")]
#[command(about = "Download xkcd comics and their explanations")]
#[command(version)]
struct Args {
    /// Config file (overrides SXKCD_CONFIG and the user config file)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the latest comic
    Latest,

    /// Print one comic by number
    Get {
        #[arg(allow_negative_numbers = true)]
        num: i64,
    },

    /// Download every comic and write the archive
    All {
        /// Archive file (defaults to output_file from config)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Maximum comics fetched at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Add newly published comics to the archive on a fixed interval
    Watch {
        /// Archive file (defaults to output_file from config)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let (config, origin) = resolver
        .load_with_source()
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting sxkcd-dl v{}", env!("CARGO_PKG_VERSION"));
    match origin {
        Some((path, source)) => info!("Config: {} ({:?})", path.display(), source),
        None => info!("Config: built-in defaults"),
    }

    let settings = DownloadSettings::from_toml(&config).context("Invalid configuration")?;
    let client = XkcdClient::new(&settings).context("Failed to create HTTP client")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    match args.command {
        Command::Latest => {
            let comic = client.fetch_latest(&cancel).await?;
            print_comic(&comic)?;
        }
        Command::Get { num } => {
            let id = ComicId::try_from(num)?;
            let comic = client.fetch(id, &cancel).await?;
            print_comic(&comic)?;
        }
        Command::All { file, concurrency } => {
            let path = file.unwrap_or(settings.output_file.clone());
            let concurrency = concurrency.unwrap_or(settings.concurrency);
            let report = download_all(Arc::new(client), &path, concurrency, &cancel)
                .await
                .with_context(|| format!("Failed to download comics to {}", path.display()))?;
            println!("{}", report);
        }
        Command::Watch { file } => {
            let path = file.unwrap_or(settings.output_file.clone());
            info!("Watching for new comics, archive: {}", path.display());
            let watcher = Watcher::new(
                Arc::new(client),
                Arc::new(ArchiveSink::new(path)),
                settings.watch_interval,
            );
            watcher.run(cancel).await;
        }
    }

    Ok(())
}

fn print_comic(comic: &Comic) -> Result<()> {
    let json = serde_json::to_string_pretty(comic).context("Failed to serialize comic")?;
    println!("{}", json);
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, cancelling"),
        _ = terminate => info!("Received terminate signal, cancelling"),
    }
    token.cancel();
}

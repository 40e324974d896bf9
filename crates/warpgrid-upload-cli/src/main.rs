//! warp-upload: stream an upload from a file or stdin.
//!
//! # Usage
//!
//! ```text
//! warp-upload store --input big.iso --dest /var/spool/big.iso
//! cat big.iso | warp-upload count
//! warp-upload --format json digest --input big.iso
//! warp-upload store -i part.bin -d out.pdf -H 'Content-Disposition: form-data; filename="a.pdf"'
//! ```
//!
//! # Exit status
//!
//! 0 on success, 1 when the upload failed softly (a write failed or the
//! body was truncated), 2 on any error including a broken stream, 130 on
//! Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::info;
use warpgrid_upload::{PartialPolicy, UploadConfig};

mod commands;

use commands::{InputArgs, Report};

#[derive(Parser)]
#[command(
    name = "warp-upload",
    about = "WarpGrid upload tool: stream an upload to disk, count it, or hash it",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to upload.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Report format: text or json
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: Format,
    /// Log format on stderr: text or json
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: Format,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the upload to a file
    Store {
        #[command(flatten)]
        input: InputArgs,
        /// Destination file (created or truncated)
        #[arg(short, long)]
        dest: PathBuf,
        /// Leave partial output in place when the upload fails.
        /// Overrides [upload].on_failure in the config.
        #[arg(long)]
        keep_partial: bool,
    },
    /// Count the bytes of the upload
    Count {
        #[command(flatten)]
        input: InputArgs,
    },
    /// SHA-256 of the upload
    Digest {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(err) = &result {
        eprintln!("Error: {err:#}");
    }
    ExitCode::from(commands::exit_status(&result))
}

async fn run(cli: Cli) -> anyhow::Result<Report> {
    let config = match &cli.config {
        Some(path) => UploadConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => UploadConfig::default(),
    };
    init_tracing(&config.logging.filter, cli.log_format)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling upload");
            let _ = shutdown_tx.send(true);
        }
    });

    let settings = &config.upload;
    let report = match cli.command {
        Commands::Store {
            input,
            dest,
            keep_partial,
        } => {
            let policy = if keep_partial {
                PartialPolicy::Keep
            } else {
                settings.on_failure
            };
            commands::store::store(&input, &dest, policy, settings, shutdown_rx).await?
        }
        Commands::Count { input } => commands::inspect::count(&input, settings, shutdown_rx).await?,
        Commands::Digest { input } => {
            commands::inspect::digest(&input, settings, shutdown_rx).await?
        }
    };

    let Some(report) = report else {
        eprintln!("Upload cancelled");
        // A stdin read may still be parked on a blocking thread; don't wait for it.
        std::process::exit(i32::from(commands::EXIT_CANCELLED));
    };

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => println!("{}", report.to_text()),
    }
    Ok(report)
}

fn init_tracing(default_filter: &str, format: Format) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        Format::Json => builder.json().init(),
        Format::Text => builder.init(),
    }
    Ok(())
}

pub mod inspect;
pub mod store;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use warpgrid_upload::config::UploadSettings;
use warpgrid_upload::{PartHeaders, UploadMeta, UploadStream, MAX_CHUNK_SIZE};

/// Exit status when the upload ended with a soft failure.
pub const EXIT_UPLOAD_FAILED: u8 = 1;
/// Exit status for errors, including a broken upload stream.
pub const EXIT_ERROR: u8 = 2;
/// Exit status after Ctrl-C.
pub const EXIT_CANCELLED: u8 = 130;

/// Where the upload comes from.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Input file, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub input: String,
    /// Bytes per chunk (overrides [upload].chunk_size)
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Expected length; a shorter or longer body fails the upload
    #[arg(long)]
    pub declared_len: Option<u64>,
    /// Part header as `Name: value` (repeatable), e.g. the original
    /// Content-Disposition and Content-Type of the upload
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in `{raw}`"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Open the input as an upload stream.
pub async fn open_input(args: &InputArgs, settings: &UploadSettings) -> anyhow::Result<UploadStream> {
    let chunk_size = args.chunk_size.unwrap_or(settings.chunk_size);
    if chunk_size == 0 {
        anyhow::bail!("--chunk-size must be greater than zero");
    }
    if chunk_size > MAX_CHUNK_SIZE {
        anyhow::bail!("--chunk-size {chunk_size} exceeds the maximum of {MAX_CHUNK_SIZE} bytes");
    }

    let headers: PartHeaders = args.headers.iter().cloned().collect();
    let mut meta = UploadMeta::from_headers(&headers);
    if let Some(len) = args.declared_len {
        meta = meta.with_declared_len(len);
    }

    if args.input == "-" {
        return Ok(UploadStream::from_reader(meta, tokio::io::stdin(), chunk_size));
    }

    let path = Path::new(&args.input);
    if meta.filename.is_none() {
        if let Some(name) = path.file_name() {
            meta = meta.with_filename(name.to_string_lossy());
        }
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(UploadStream::from_reader(meta, file, chunk_size))
}

/// What a command reports once its upload has ended.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Report {
    Store { dest: PathBuf, stored: bool },
    Count { bytes: u64 },
    Digest { bytes: u64, sha256: String },
}

impl Report {
    pub fn to_text(&self) -> String {
        match self {
            Report::Store { dest, stored: true } => format!("✓ Uploaded to {}", dest.display()),
            Report::Store { stored: false, .. } => "Upload Failed".to_string(),
            Report::Count { bytes } => format!("{bytes}"),
            Report::Digest { bytes, sha256 } => format!("{sha256}  ({bytes} bytes)"),
        }
    }

    pub fn status(&self) -> u8 {
        match self {
            Report::Store { stored: false, .. } => EXIT_UPLOAD_FAILED,
            _ => 0,
        }
    }
}

/// Process exit status for a command that ran to an end.
///
/// A soft failure is a report with status 1; a hard failure (the stream
/// broke) surfaces as an error and exits with 2.
pub fn exit_status(result: &anyhow::Result<Report>) -> u8 {
    match result {
        Ok(report) => report.status(),
        Err(_) => EXIT_ERROR,
    }
}

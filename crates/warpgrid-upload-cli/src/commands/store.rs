use std::path::Path;

use anyhow::Context;
use tokio::sync::watch;
use warpgrid_upload::config::UploadSettings;
use warpgrid_upload::{consume_to_sink, with_shutdown, FileSink, PartialPolicy};

use super::{open_input, InputArgs, Report};

/// Stream the input into `dest`.
///
/// Returns `None` if the upload was cancelled. A broken input stream is an
/// error; a failed write is a `stored: false` report.
pub async fn store(
    input: &InputArgs,
    dest: &Path,
    policy: PartialPolicy,
    settings: &UploadSettings,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<Report>> {
    let upload = open_input(input, settings).await?;
    let sink = FileSink::create(dest, policy)
        .await
        .with_context(|| format!("creating {}", dest.display()))?
        .sync_on_commit(settings.sync_on_commit);

    let Some(outcome) = with_shutdown(consume_to_sink(upload, sink), shutdown).await else {
        return Ok(None);
    };
    let stored = outcome.into_result()?;

    Ok(Some(Report::Store {
        dest: dest.to_path_buf(),
        stored,
    }))
}

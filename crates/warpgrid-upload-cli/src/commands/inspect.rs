use tokio::sync::watch;
use warpgrid_upload::config::UploadSettings;
use warpgrid_upload::{consume_to_byte_count, consume_to_digest, with_shutdown};

use super::{open_input, InputArgs, Report};

pub async fn count(
    input: &InputArgs,
    settings: &UploadSettings,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<Report>> {
    let upload = open_input(input, settings).await?;
    let Some(outcome) = with_shutdown(consume_to_byte_count(upload), shutdown).await else {
        return Ok(None);
    };
    Ok(Some(Report::Count {
        bytes: outcome.into_result()?,
    }))
}

pub async fn digest(
    input: &InputArgs,
    settings: &UploadSettings,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<Report>> {
    let upload = open_input(input, settings).await?;
    let Some(outcome) = with_shutdown(consume_to_digest(upload), shutdown).await else {
        return Ok(None);
    };
    let digest = outcome.into_result()?;
    Ok(Some(Report::Digest {
        bytes: digest.bytes,
        sha256: digest.sha256,
    }))
}

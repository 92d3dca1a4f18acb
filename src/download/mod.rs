use crate::http::Transport;
use crate::progress::{ProgressListeners, StepKind};
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Downloads `url` into `dest`, creating missing parent directories.
#[tracing::instrument(skip(runtime, transport, dest, progress))]
pub async fn download_asset<R: Runtime, T: Transport + ?Sized>(
    runtime: &R,
    transport: &T,
    url: &str,
    dest: &Path,
    progress: &ProgressListeners,
) -> Result<()> {
    info!("Downloading {}...", url);
    progress.step_started(url, StepKind::Download);

    let data = transport.download(url, progress).await?;

    if let Some(parent) = dest.parent()
        && !runtime.exists(parent)
    {
        runtime
            .create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    runtime
        .write(dest, &data)
        .with_context(|| format!("Failed to save download to {:?}", dest))?;

    info!("Download complete.");
    Ok(())
}

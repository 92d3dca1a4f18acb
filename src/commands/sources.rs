use anyhow::Result;

use crate::http::Transport;
use crate::installer::ModInstaller;
use crate::runtime::Runtime;

/// Registers the source behind `definition` and the sources it lists.
#[tracing::instrument(skip(installer))]
pub async fn add_source<R: Runtime, T: Transport>(
    installer: &mut ModInstaller<R, T>,
    definition: &str,
) -> Result<()> {
    installer.register_source(definition).await
}

/// Refreshes all sources; `force` downloads unchanged ones again.
#[tracing::instrument(skip(installer))]
pub async fn refresh<R: Runtime, T: Transport>(
    installer: &mut ModInstaller<R, T>,
    force: bool,
) -> Result<()> {
    installer.refresh_sources(force).await
}

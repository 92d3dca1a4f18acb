use anyhow::Result;

use super::{ModSpec, find_definition};
use crate::http::Transport;
use crate::installer::ModInstaller;
use crate::runtime::Runtime;

/// Installs the mod `spec` names together with its dependencies.
#[tracing::instrument(skip(installer))]
pub async fn install<R: Runtime, T: Transport>(
    installer: &mut ModInstaller<R, T>,
    spec: &ModSpec,
) -> Result<()> {
    let target = find_definition(installer, spec)?;
    installer.install(&target).await
}

/// Removes every installed version of `name`.
#[tracing::instrument(skip(installer))]
pub fn uninstall<R: Runtime, T: Transport>(
    installer: &mut ModInstaller<R, T>,
    name: &str,
) -> Result<()> {
    installer.uninstall_all(name)
}

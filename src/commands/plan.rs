use anyhow::Result;
use std::io::Write;

use super::{ModSpec, find_definition};
use crate::http::Transport;
use crate::installer::ModInstaller;
use crate::runtime::Runtime;

/// Prints what installing `spec` would uninstall and install, without
/// changing anything.
pub fn plan<R: Runtime, T: Transport>(
    installer: &ModInstaller<R, T>,
    spec: &ModSpec,
    out: &mut impl Write,
) -> Result<()> {
    let target = find_definition(installer, spec)?;
    let resolution = installer.resolve(&target);
    if let Some(error) = resolution.error() {
        return Err(error.into());
    }

    if resolution.is_empty() {
        writeln!(out, "{} is already installed.", target.display_name())?;
        return Ok(());
    }

    if !resolution.uninstall.is_empty() {
        writeln!(out, "Uninstall:")?;
        for installation in &resolution.uninstall {
            writeln!(out, "  {}", installation.display_name())?;
        }
    }
    if !resolution.install.is_empty() {
        writeln!(out, "Install:")?;
        for definition in &resolution.install {
            writeln!(out, "  {}", definition.display_name())?;
        }
    }
    Ok(())
}

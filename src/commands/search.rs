use anyhow::Result;
use std::io::Write;

use crate::catalog::ModDefinition;
use crate::http::Transport;
use crate::installer::ModInstaller;
use crate::runtime::Runtime;

/// Prints the latest version of every known mod whose name contains
/// `name`, ignoring case.
pub fn search<R: Runtime, T: Transport>(
    installer: &ModInstaller<R, T>,
    name: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let needle = name.map(str::to_lowercase);
    let found: Vec<ModDefinition> = installer
        .latest_versions()
        .into_iter()
        .filter(|definition| {
            needle
                .as_deref()
                .is_none_or(|needle| definition.name.to_lowercase().contains(needle))
        })
        .collect();

    if found.is_empty() {
        writeln!(out, "No mods found.")?;
        return Ok(());
    }

    for definition in &found {
        let mut line = definition.display_name();
        if let Some(description) = definition.description.as_deref().filter(|d| !d.is_empty()) {
            line.push_str(&format!(" - {}", description));
        }
        if let Some(installed) = installer.installed_version(&definition.name) {
            line.push_str(&format!(" [installed: {}]", installed));
        }
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

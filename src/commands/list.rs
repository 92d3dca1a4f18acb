use anyhow::Result;
use log::debug;
use std::io::Write;

use crate::http::Transport;
use crate::installer::ModInstaller;
use crate::runtime::Runtime;

/// Prints the installed mods, one `NAME VERSION` per line.
pub fn list<R: Runtime, T: Transport>(
    installer: &ModInstaller<R, T>,
    out: &mut impl Write,
) -> Result<()> {
    let installations = installer.installations();
    if installations.is_empty() {
        writeln!(out, "No mods installed.")?;
        return Ok(());
    }

    debug!("Found {} installation(s)", installations.len());
    for installation in installations {
        writeln!(out, "{}", installation.display_name())?;
    }
    Ok(())
}

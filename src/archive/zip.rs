use anyhow::{Context, Result};
use log::{debug, warn};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use super::{Destination, EntryTarget, entry_target, invalid_entry_warning, ledger_path};
use crate::progress::ProgressListeners;
use crate::runtime::Runtime;

/// Extracts .zip assets entry by entry.
pub struct ZipExtractor;

impl ZipExtractor {
    /// Extracts the archive at `archive_path` into `destination`, overwriting
    /// existing files. Returns the ledger path of every directory and file
    /// produced, in archive order.
    #[tracing::instrument(skip(self, runtime, destination, progress))]
    pub fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        destination: &Destination<'_>,
        progress: &ProgressListeners,
    ) -> Result<Vec<String>> {
        debug!("Extracting zip archive to {:?}...", destination.directory);
        let mut reader = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        // zip needs Read + Seek
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
        let mut archive = ZipArchive::new(std::io::Cursor::new(buffer))
            .with_context(|| format!("Failed to parse ZIP archive {:?}", archive_path))?;

        let mut produced = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry {}", i))?;
            let name = entry.name().to_string();

            let relative = match entry_target(&name, destination.zip_directory) {
                EntryTarget::Skip => continue,
                EntryTarget::Invalid => {
                    warn!("Ignoring invalid archive entry {:?}", name);
                    progress.detail(&invalid_entry_warning(&name));
                    continue;
                }
                EntryTarget::Path(relative) => relative,
            };

            let target = destination.directory.join(&relative);
            let Some(ledger) = ledger_path(destination.root, &target) else {
                warn!("Ignoring archive entry {:?} outside of {:?}", name, destination.root);
                progress.detail(&invalid_entry_warning(&name));
                continue;
            };

            if entry.is_dir() {
                if !runtime.exists(&target) {
                    progress.detail(&ledger);
                    runtime
                        .create_dir_all(&target)
                        .with_context(|| format!("Failed to create directory {:?}", target))?;
                }
                produced.push(ledger);
                continue;
            }

            if let Some(parent) = target.parent()
                && !runtime.exists(parent)
            {
                runtime.create_dir_all(parent)?;
            }

            progress.detail(&ledger);
            let mut file = runtime.create_file(&target)?;
            std::io::copy(&mut entry, &mut file)
                .with_context(|| format!("Could not extract {} from {:?}", name, archive_path))?;
            produced.push(ledger);
        }

        Ok(produced)
    }
}

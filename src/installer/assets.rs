use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::PathBuf;

use super::ModInstaller;
use crate::archive::{Destination, ZipExtractor, invalid_entry_warning, ledger_path};
use crate::catalog::{Asset, ModDefinition};
use crate::error::ModInstallerError;
use crate::http::Transport;
use crate::installation::Installation;
use crate::progress::StepKind;
use crate::runtime::{Runtime, is_path_under, normalize_path};

enum Deletion {
    Deleted,
    /// A directory that still has content; retried in the next pass.
    Postponed,
    Ignored,
}

impl<R: Runtime, T: Transport> ModInstaller<R, T> {
    /// Places the cached assets of `definition` into the mods directory and
    /// returns the record of everything written.
    pub(super) fn install_assets(&self, definition: &ModDefinition) -> Result<Installation> {
        self.progress
            .step_started(&definition.display_name(), StepKind::Install);

        let mut installation = Installation::for_definition(definition);
        for asset in &definition.assets {
            let produced = self
                .install_asset(definition, asset)
                .with_context(|| format!("Could not install {}", asset.file_name()))?;
            for path in produced {
                if !installation.is_asset_referenced(&path) {
                    installation.add_asset(path);
                }
            }
        }

        Ok(installation)
    }

    fn install_asset(&self, definition: &ModDefinition, asset: &Asset) -> Result<Vec<String>> {
        let cached = self.repository.asset_path(definition, asset)?;
        let directory = match asset.target_directory.as_deref() {
            Some(target) if !target.is_empty() => self.mods_dir.join(target),
            _ => self.mods_dir.clone(),
        };

        if asset.is_zip() {
            let destination = Destination {
                root: &self.mods_dir,
                directory: &directory,
                zip_directory: asset.zip_directory.as_deref(),
            };
            return ZipExtractor.extract(self.runtime(), &cached, &destination, &self.progress);
        }

        let file_name = asset.file_name();
        let target = directory.join(&file_name);
        let Some(ledger) = ledger_path(&self.mods_dir, &target) else {
            warn!("Ignoring asset {:?} outside of {:?}", target, self.mods_dir);
            self.progress.detail(&invalid_entry_warning(&file_name));
            return Ok(Vec::new());
        };

        if !self.runtime().exists(&directory) {
            self.runtime()
                .create_dir_all(&directory)
                .with_context(|| format!("Failed to create directory {:?}", directory))?;
        }
        self.progress.detail(&ledger);
        self.runtime()
            .copy(&cached, &target)
            .with_context(|| format!("Failed to copy {:?} to {:?}", cached, target))?;

        Ok(vec![ledger])
    }

    /// Deletes the ledger paths no remaining installation references.
    ///
    /// Runs in passes until nothing more can be deleted, so a directory
    /// listed before its content goes once it became empty.
    pub(super) fn delete_assets(&self, assets: &[String]) -> Result<()> {
        let mut pending: Vec<&String> = assets.iter().collect();

        loop {
            let mut postponed = Vec::new();
            let mut deleted = 0;
            for asset in pending {
                match self.delete_asset(asset)? {
                    Deletion::Deleted => deleted += 1,
                    Deletion::Postponed => postponed.push(asset),
                    Deletion::Ignored => {}
                }
            }

            if deleted == 0 || postponed.is_empty() {
                if !postponed.is_empty() {
                    debug!("Keeping non-empty directories {:?}", postponed);
                }
                return Ok(());
            }
            pending = postponed;
        }
    }

    fn delete_asset(&self, asset: &str) -> Result<Deletion> {
        if self.installations.is_asset_referenced(asset) {
            debug!("{} is still used by another installation", asset);
            return Ok(Deletion::Ignored);
        }

        let Some(path) = self.mods_path(asset) else {
            warn!("Refusing to delete {} outside of {:?}", asset, self.mods_dir);
            return Ok(Deletion::Ignored);
        };
        let runtime = self.runtime();
        if !runtime.exists(&path) {
            return Ok(Deletion::Ignored);
        }

        if runtime.is_dir(&path) {
            let entries = runtime.read_dir(&path)?;
            if !entries.is_empty() {
                return Ok(Deletion::Postponed);
            }
            runtime.remove_dir(&path).map_err(|e| {
                ModInstallerError::Filesystem(format!("Could not delete {}: {:#}", asset, e))
            })?;
        } else {
            runtime.remove_file(&path).map_err(|e| {
                ModInstallerError::Filesystem(format!("Could not delete {}: {:#}", asset, e))
            })?;
        }

        self.progress.detail(&format!("Deleted {}", asset));
        Ok(Deletion::Deleted)
    }

    /// Resolves a ledger path; `None` unless it lies strictly below the mods
    /// directory.
    fn mods_path(&self, asset: &str) -> Option<PathBuf> {
        let path = normalize_path(&self.mods_dir.join(asset));
        let root = normalize_path(&self.mods_dir);
        (path != root && is_path_under(&path, &root)).then_some(path)
    }
}

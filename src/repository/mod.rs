//! Aggregated view over all registered catalog sources and the local cache
//! of downloaded assets.
//!
//! # Layout
//!
//! ```text
//! <state>/repository/
//! ├── sources.json
//! └── <mod name>/<version>/<asset file>
//! ```

mod description;
mod loader;
mod locator;
mod source;

use anyhow::{Context, Result};
use chrono::{Duration, Local, Utc};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use crate::catalog::{Asset, ModDefinition, ModDefinitions, ModDependency};
use crate::download::download_asset;
use crate::error::{ModInstallerError, as_installer_error};
use crate::http::Transport;
use crate::progress::{ProgressListeners, StepKind};
use crate::resolver::Catalog;
use crate::runtime::{Runtime, is_path_under};

pub use description::{GithubAsset, GithubRelease, SourceDescription};
pub use loader::{Loaded, SourceLoader};
pub use locator::{DEFAULT_API_URL, DEFAULT_RAW_URL, GithubEndpoints, SourceLocator};
pub use source::{PARAMETER_ETAG, PARAMETER_VERSION, SCHEMA_VERSION, Source, Sources};

pub const SOURCES_FILE: &str = "sources.json";

/// Sources last refreshed longer ago than this are considered old.
const MAX_SOURCE_AGE_DAYS: i64 = 30;

pub struct Repository<R: Runtime, T: Transport> {
    runtime: R,
    transport: T,
    base_path: PathBuf,
    endpoints: GithubEndpoints,
    sources: Sources,
}

impl<R: Runtime, T: Transport> Repository<R, T> {
    pub fn new(runtime: R, transport: T, base_path: PathBuf, endpoints: GithubEndpoints) -> Self {
        Self {
            runtime,
            transport,
            base_path,
            endpoints,
            sources: Sources::new(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn sources_path(&self) -> PathBuf {
        self.base_path.join(SOURCES_FILE)
    }

    /// Loads the saved sources. Returns whether any were found.
    #[tracing::instrument(skip(self))]
    pub fn initialize(&mut self) -> Result<bool> {
        if !self.runtime.exists(&self.base_path) {
            self.runtime
                .create_dir_all(&self.base_path)
                .with_context(|| format!("Could not create base path {:?}", self.base_path))?;
        }

        self.sources = Sources::load(&self.runtime, &self.sources_path())?;
        debug!("Loaded {} sources", self.sources.len());
        Ok(!self.sources.is_empty())
    }

    pub fn matching(&self, dependency: &ModDependency) -> ModDefinitions {
        let mut result = ModDefinitions::new();
        for source in &self.sources {
            result.extend(source.matching(dependency));
        }
        result
    }

    /// The definition of the first source that has it.
    pub fn get_mod_definition(&self, name: &str, version: &str) -> Option<&ModDefinition> {
        self.sources
            .iter()
            .find_map(|source| source.get_mod_definition(name, version))
    }

    /// Every known version of `name`, newest first.
    pub fn get_mod_definitions(&self, name: &str) -> ModDefinitions {
        self.sources
            .iter()
            .flat_map(|source| source.mod_definitions.with_name(name))
            .collect::<ModDefinitions>()
            .sorted_newest_first()
    }

    /// The latest version of every mod, per source.
    pub fn latest_versions(&self) -> ModDefinitions {
        self.sources
            .iter()
            .flat_map(|source| source.latest_versions())
            .collect()
    }

    /// Where `asset` of `definition` is cached. Catalog entries whose name,
    /// version or file name would leave the repository are rejected.
    pub fn asset_path(&self, definition: &ModDefinition, asset: &Asset) -> Result<PathBuf> {
        let file_name = asset.file_name();
        let mut path = self.base_path.clone();
        for part in [definition.name.as_str(), definition.version(), file_name.as_str()] {
            path.push(cache_component(part)?);
        }

        if !is_path_under(&path, &self.base_path) {
            return Err(invalid_cache_path(&path.to_string_lossy()));
        }
        Ok(path)
    }

    /// Downloads the assets of `definition` that are not cached yet.
    #[tracing::instrument(skip(self, definition, progress), fields(definition = %definition))]
    pub async fn download_assets(
        &self,
        definition: &ModDefinition,
        progress: &ProgressListeners,
    ) -> Result<()> {
        for asset in &definition.assets {
            let path = self.asset_path(definition, asset)?;
            if self.runtime.exists(&path) {
                debug!("Using cached asset {:?}", path);
                continue;
            }
            download_asset(&self.runtime, &self.transport, &asset.url, &path, progress).await?;
        }
        Ok(())
    }

    /// Adds the source behind `definition` and every source it lists.
    ///
    /// A rate limit aborts the registration; sources added before that are
    /// kept and saved.
    #[tracing::instrument(skip(self, progress))]
    pub async fn register_source(
        &mut self,
        definition: &str,
        progress: &ProgressListeners,
    ) -> Result<()> {
        progress.started(&format!("Add {}", definition));

        let result = self
            .register_pending(VecDeque::from([definition.to_string()]), true, progress)
            .await;
        let result = self.finish_sources_operation(result, progress);

        progress.step_progress(1, 1);
        progress.finished(None);
        result
    }

    /// Refreshes every source. Unless `force` is set, sources that did not
    /// change since the last refresh are not downloaded again.
    #[tracing::instrument(skip(self, progress))]
    pub async fn refresh_sources(&mut self, force: bool, progress: &ProgressListeners) -> Result<()> {
        progress.started("Refreshing Sources");

        let previous = self.latest_versions();
        let result = self.refresh_all(force, progress).await;
        let summary = result.is_ok().then(|| self.changes_since(&previous));
        let result = self.finish_sources_operation(result, progress);

        progress.finished(summary.as_deref());
        result
    }

    /// Forgets the cached ETags so the next refresh downloads everything.
    pub fn invalidate_sources(&mut self) {
        for source in self.sources.iter_mut() {
            source.remove_parameter(PARAMETER_ETAG);
        }
    }

    pub fn are_sources_old(&self) -> bool {
        match self.sources.last_update {
            Some(last_update) => Utc::now() - last_update > Duration::days(MAX_SOURCE_AGE_DAYS),
            None => true,
        }
    }

    pub fn is_source_migration_required(&self) -> bool {
        self.sources.iter().any(Source::requires_migration)
    }

    async fn refresh_all(&mut self, force: bool, progress: &ProgressListeners) -> Result<()> {
        let total = self.sources.len();

        for index in 0..total {
            if let Err(e) = self.refresh_source(index, force, progress).await {
                if is_abort(&e) {
                    return Err(e);
                }
                warn!("Failed to refresh source: {:#}", e);
                progress.detail(&format!("{:#}", e));
            }
            progress.step_progress((index + 1) as u64, total as u64);
        }

        Ok(())
    }

    async fn refresh_source(
        &mut self,
        index: usize,
        force: bool,
        progress: &ProgressListeners,
    ) -> Result<()> {
        let Some(source) = self.sources.get(index) else {
            return Ok(());
        };
        let definition = source.definition.clone();
        let etag = if force || source.requires_migration() {
            None
        } else {
            source.etag().map(str::to_string)
        };

        progress.step_started(&definition, StepKind::Refresh);
        let loaded = self.loader().load(&definition, etag).await?;

        let listed = match loaded {
            Loaded::Unmodified => {
                progress.detail("Unmodified");
                source_definitions(self.sources.get(index))
            }
            Loaded::Source(refreshed) => {
                let listed = refreshed.definitions.clone();
                if let Some(source) = self.sources.get_mut(index) {
                    source.update(refreshed);
                }
                progress.detail("Updated");
                listed
            }
        };

        // Listed sources may be missing when an earlier registration failed.
        self.register_pending(listed.into(), false, progress).await
    }

    /// Registers the given definitions and, transitively, the definitions
    /// they list. A source is added before the sources it lists.
    async fn register_pending(
        &mut self,
        mut pending: VecDeque<String>,
        report_present: bool,
        progress: &ProgressListeners,
    ) -> Result<()> {
        let mut first = true;

        while let Some(definition) = pending.pop_front() {
            let requested = std::mem::take(&mut first);

            if self.sources.contains(&definition) {
                if requested && report_present {
                    progress.step_started(&definition, StepKind::Add);
                    progress.detail("Already present.");
                }
                continue;
            }

            progress.step_started(&definition, StepKind::Add);
            progress.detail("Loading definition");

            match self.loader().load(&definition, None).await {
                Ok(Loaded::Source(source)) => {
                    info!("Registered source {}", definition);
                    pending.extend(source.definitions.iter().cloned());
                    self.sources.add(source);
                }
                Ok(Loaded::Unmodified) => {}
                Err(e) if is_abort(&e) => return Err(e),
                Err(e) => {
                    warn!("Could not register source {}: {:#}", definition, e);
                    progress.error(&format!("Could not register source: {:#}", e));
                }
            }
        }

        Ok(())
    }

    /// Saves the sources whatever the outcome and reports a rate limit.
    fn finish_sources_operation(
        &mut self,
        result: Result<()>,
        progress: &ProgressListeners,
    ) -> Result<()> {
        if let Err(e) = &result
            && let Some(ModInstallerError::RateLimited { reset }) = as_installer_error(e)
        {
            progress.detail(&format!(
                "RATE LIMIT REACHED. Please try again after {}",
                reset.with_timezone(&Local).format("%H:%M:%S")
            ));
            progress.detail("Aborting now.");
        }

        self.sources.last_update = Some(Utc::now());
        if let Err(e) = self.sources.save(&self.runtime, &self.sources_path()) {
            progress.detail(&format!("Could not save sources: {:#}", e));
            return result.and(Err(e));
        }

        result
    }

    fn changes_since(&self, previous: &ModDefinitions) -> String {
        let changed: Vec<String> = self
            .latest_versions()
            .iter()
            .filter(|definition| !previous.contains(definition))
            .map(|definition| definition.name.clone())
            .collect();

        if changed.is_empty() {
            return "No changes found".to_string();
        }

        format!(
            "The following mods were added/updated:\n\t{}",
            changed.join("\n\t")
        )
    }

    fn loader(&self) -> SourceLoader<'_, R, T> {
        SourceLoader::new(&self.runtime, &self.transport, &self.endpoints)
    }
}

impl<R: Runtime, T: Transport> Catalog for Repository<R, T> {
    fn matching(&self, dependency: &ModDependency) -> ModDefinitions {
        Repository::matching(self, dependency)
    }

    fn get_mod_definition(&self, name: &str, version: &str) -> Option<ModDefinition> {
        Repository::get_mod_definition(self, name, version).cloned()
    }
}

/// Rate limits and unreachable hosts end a whole refresh or registration.
fn is_abort(error: &anyhow::Error) -> bool {
    matches!(
        as_installer_error(error),
        Some(ModInstallerError::RateLimited { .. } | ModInstallerError::HostUnreachable(_))
    )
}

/// `part` as exactly one normal path component.
fn cache_component(part: &str) -> Result<&Path> {
    let path = Path::new(part);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !part.contains(['/', '\\']) => Ok(path),
        _ => Err(invalid_cache_path(part)),
    }
}

fn invalid_cache_path(path: &str) -> anyhow::Error {
    ModInstallerError::Filesystem(format!("Invalid asset cache path {:?}", path)).into()
}

fn source_definitions(source: Option<&Source>) -> Vec<String> {
    source.map(|s| s.definitions.clone()).unwrap_or_default()
}

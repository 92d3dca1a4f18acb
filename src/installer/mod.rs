//! Executes resolutions against the mods directory.
//!
//! [`ModInstaller`] owns the repository, the installation records and the
//! listener registries. Every operation runs to completion before the next
//! one starts; a failed step aborts the remaining steps without rolling back
//! the ones already done.

mod assets;

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{ModDefinition, ModDefinitions};
use crate::error::ModInstallerError;
use crate::http::Transport;
use crate::installation::{Installation, Installations};
use crate::progress::{
    ChangeListener, ChangeListeners, ListenerHandle, ProgressListener, ProgressListeners, StepKind,
};
use crate::repository::{GithubEndpoints, Repository, Sources};
use crate::resolver::{DependencyResolver, Resolution};
use crate::runtime::Runtime;

pub const INSTALLATIONS_FILE: &str = "installations.json";
pub const REPOSITORY_DIR: &str = "repository";

pub struct ModInstaller<R: Runtime, T: Transport> {
    repository: Repository<R, T>,
    installations: Installations,
    state_dir: PathBuf,
    mods_dir: PathBuf,
    progress: ProgressListeners,
    installations_changed: ChangeListeners,
    sources_changed: ChangeListeners,
}

impl<R: Runtime, T: Transport> ModInstaller<R, T> {
    /// Creates an installer keeping its state in `state_dir` and installing
    /// into `mods_dir`. Nothing is read until [`ModInstaller::initialize`].
    pub fn new(
        runtime: R,
        transport: T,
        state_dir: PathBuf,
        mods_dir: PathBuf,
        endpoints: GithubEndpoints,
    ) -> Self {
        let repository = Repository::new(
            runtime,
            transport,
            state_dir.join(REPOSITORY_DIR),
            endpoints,
        );
        Self {
            repository,
            installations: Installations::new(),
            state_dir,
            mods_dir,
            progress: ProgressListeners::new(),
            installations_changed: ChangeListeners::new(),
            sources_changed: ChangeListeners::new(),
        }
    }

    pub fn subscribe_progress(&mut self, listener: Arc<dyn ProgressListener>) -> ListenerHandle {
        self.progress.subscribe(listener)
    }

    pub fn unsubscribe_progress(&mut self, handle: ListenerHandle) -> bool {
        self.progress.unsubscribe(handle)
    }

    pub fn subscribe_installations_changed(
        &mut self,
        listener: Arc<dyn ChangeListener>,
    ) -> ListenerHandle {
        self.installations_changed.subscribe(listener)
    }

    pub fn unsubscribe_installations_changed(&mut self, handle: ListenerHandle) -> bool {
        self.installations_changed.unsubscribe(handle)
    }

    pub fn subscribe_sources_changed(&mut self, listener: Arc<dyn ChangeListener>) -> ListenerHandle {
        self.sources_changed.subscribe(listener)
    }

    pub fn unsubscribe_sources_changed(&mut self, handle: ListenerHandle) -> bool {
        self.sources_changed.unsubscribe(handle)
    }

    pub fn repository(&self) -> &Repository<R, T> {
        &self.repository
    }

    pub fn installations(&self) -> &Installations {
        &self.installations
    }

    pub fn sources(&self) -> &Sources {
        self.repository.sources()
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    pub fn installations_path(&self) -> PathBuf {
        self.state_dir.join(INSTALLATIONS_FILE)
    }

    /// Loads the saved sources and installations. Missing files count as
    /// empty; a file that cannot be read is reported and returned as error
    /// after the remaining state was loaded.
    #[tracing::instrument(skip(self))]
    pub fn initialize(&mut self) -> Result<()> {
        self.progress.started("Initializing");
        self.progress.step_started("modpm", StepKind::Initialize);

        self.progress.detail("Repository");
        let repository = self.repository.initialize();
        match &repository {
            Ok(true) => self.sources_changed.changed(),
            Ok(false) => {}
            Err(e) => self.progress.error(&format!("{:#}", e)),
        }
        self.progress.step_progress(1, 2);

        self.progress.detail("Installed mods");
        let installations = Installations::load(self.runtime(), &self.installations_path());
        match &installations {
            Ok(loaded) => {
                self.installations = loaded.clone();
                if !self.installations.is_empty() {
                    self.installations_changed.changed();
                }
            }
            Err(e) => self.progress.error(&format!("{:#}", e)),
        }
        self.progress.step_progress(2, 2);
        self.progress.finished(None);

        repository?;
        installations?;
        Ok(())
    }

    /// Plans the installation of `target` against the current installations.
    pub fn resolve(&self, target: &ModDefinition) -> Resolution {
        DependencyResolver::new(&self.repository, &self.installations).resolve(target)
    }

    /// Installs `target` with its dependencies, replacing other installed
    /// versions of every mod involved.
    #[tracing::instrument(skip(self, target), fields(target = %target))]
    pub async fn install(&mut self, target: &ModDefinition) -> Result<()> {
        self.progress
            .started(&format!("Installing {}", target.display_name()));

        let result = self.perform_install(target).await;
        if let Err(e) = &result {
            self.progress.error(&format!("{:#}", e));
            self.progress.step_progress(1, 1);
        }

        self.progress.finished(None);
        result
    }

    /// Uninstalls every installed version of `name`.
    #[tracing::instrument(skip(self))]
    pub fn uninstall_all(&mut self, name: &str) -> Result<()> {
        self.progress.started(&format!("Uninstalling {}", name));

        let result = self.perform_uninstall_all(name);
        if let Err(e) = &result {
            self.progress.error(&format!("{:#}", e));
        }

        self.progress.finished(None);
        result
    }

    /// The definitions `definition` needs on an empty mods directory,
    /// dependencies first.
    pub fn get_required(&self, definition: &ModDefinition) -> Result<ModDefinitions> {
        let empty = Installations::new();
        let resolution = DependencyResolver::new(&self.repository, &empty).resolve(definition);
        check_resolution(&resolution)?;

        let mut required = resolution.install;
        required.remove(definition);
        Ok(required)
    }

    /// Latest versions of mods that depend on the mod of `definition`.
    pub fn get_required_by(&self, definition: &ModDefinition) -> ModDefinitions {
        self.repository
            .latest_versions()
            .iter()
            .filter(|candidate| candidate.depends_on(&definition.name))
            .cloned()
            .collect()
    }

    pub fn is_required_by_installation(&self, definition: &ModDefinition) -> bool {
        self.get_required_by(definition)
            .iter()
            .any(|dependent| self.is_any_version_installed(dependent))
    }

    /// Installed versions of `name`, comma separated.
    pub fn installed_version(&self, name: &str) -> Option<String> {
        let installed = self.installations.with_name(name);
        if installed.is_empty() {
            return None;
        }
        Some(
            installed
                .iter()
                .map(|i| i.version.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    pub fn is_exact_version_installed(&self, definition: &ModDefinition) -> bool {
        self.installations.contains_definition(definition)
    }

    pub fn is_any_version_installed(&self, definition: &ModDefinition) -> bool {
        !self.installations.with_name(&definition.name).is_empty()
    }

    pub fn is_other_version_installed(&self, definition: &ModDefinition) -> bool {
        self.is_any_version_installed(definition) && !self.is_exact_version_installed(definition)
    }

    pub fn get_mod_definition(&self, name: &str, version: &str) -> Option<&ModDefinition> {
        self.repository.get_mod_definition(name, version)
    }

    pub fn get_mod_definitions(&self, name: &str) -> ModDefinitions {
        self.repository.get_mod_definitions(name)
    }

    pub fn latest_versions(&self) -> ModDefinitions {
        self.repository.latest_versions()
    }

    pub async fn register_source(&mut self, definition: &str) -> Result<()> {
        let result = self
            .repository
            .register_source(definition, &self.progress)
            .await;
        self.sources_changed.changed();
        result
    }

    pub async fn refresh_sources(&mut self, force: bool) -> Result<()> {
        let result = self.repository.refresh_sources(force, &self.progress).await;
        self.sources_changed.changed();
        result
    }

    pub fn invalidate_sources(&mut self) {
        self.repository.invalidate_sources();
    }

    pub fn are_sources_old(&self) -> bool {
        self.repository.are_sources_old()
    }

    pub fn is_source_migration_required(&self) -> bool {
        self.repository.is_source_migration_required()
    }

    async fn perform_install(&mut self, target: &ModDefinition) -> Result<()> {
        let resolution = self.resolve(target);
        check_resolution(&resolution)?;

        if resolution.is_empty() {
            info!("{} is already installed", target.display_name());
            self.progress
                .detail(&format!("{} is already installed.", target.display_name()));
            return Ok(());
        }

        let executed = self.execute(&resolution).await;
        let saved = self.save_installations();
        self.installations_changed.changed();
        executed.and(saved)
    }

    async fn execute(&mut self, resolution: &Resolution) -> Result<()> {
        for installation in &resolution.uninstall {
            self.uninstall(installation)?;
        }

        for definition in &resolution.install {
            self.repository
                .download_assets(definition, &self.progress)
                .await?;
            let installation = self.install_assets(definition)?;
            debug!("Installed {}", installation.display_name());
            self.installations.add(installation);
        }

        Ok(())
    }

    fn perform_uninstall_all(&mut self, name: &str) -> Result<()> {
        let installed = self.installations.with_name(name);
        if installed.is_empty() {
            return Err(ModInstallerError::NotInstalled(name.to_string()).into());
        }

        let result = installed
            .iter()
            .try_for_each(|installation| self.uninstall(installation));
        let saved = self.save_installations();
        self.installations_changed.changed();
        result.and(saved)
    }

    /// Removes the record of `installation`, then the files only it owned.
    fn uninstall(&mut self, installation: &Installation) -> Result<()> {
        if !self.installations.remove(installation) {
            return Err(ModInstallerError::NotInstalled(installation.display_name()).into());
        }

        self.progress
            .step_started(&installation.display_name(), StepKind::Uninstall);
        self.delete_assets(&installation.assets)?;
        Ok(())
    }

    fn save_installations(&self) -> Result<()> {
        self.installations
            .save(self.runtime(), &self.installations_path())
            .context("Could not save installed mods")
    }

    fn runtime(&self) -> &R {
        self.repository.runtime()
    }
}

fn check_resolution(resolution: &Resolution) -> Result<()> {
    match resolution.error() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::as_installer_error;
    use crate::http::MockTransport;
    use crate::progress::MockChangeListener;
    use crate::progress::testing::RecordingProgress;
    use crate::runtime::RealRuntime;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    struct Fixture {
        dir: TempDir,
        installer: ModInstaller<RealRuntime, MockTransport>,
        recorder: Arc<RecordingProgress>,
    }

    impl Fixture {
        fn mods(&self) -> PathBuf {
            self.dir.path().join("mods")
        }

        fn def(&self, name: &str, version: &str) -> ModDefinition {
            self.installer
                .get_mod_definition(name, version)
                .cloned()
                .unwrap()
        }

        async fn install(&mut self, name: &str, version: &str) -> Result<()> {
            let target = self.def(name, version);
            self.installer.install(&target).await
        }

        fn installed(&self) -> Vec<String> {
            self.installer
                .installations()
                .iter()
                .map(|i| i.display_name())
                .collect()
        }
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap().into_inner()
    }

    /// Serves every asset URL; zip URLs get an archive of the listed entries.
    fn transport() -> MockTransport {
        let mut transport = MockTransport::new();
        transport.expect_download().returning(|url, _| {
            let file = url.rsplit('/').next().unwrap_or_default();
            Ok(match file {
                "Bags.zip" => zip_bytes(&[
                    ("Bags/", ""),
                    ("Bags/items.json", "{}"),
                    ("../evil.dll", "evil"),
                ]),
                "Pack.zip" => zip_bytes(&[("Shared.dll", "pack"), ("Pack.dll", "pack")]),
                "broken.dll" => return Err(anyhow::anyhow!("connection reset")),
                other => format!("content of {}", other).into_bytes(),
            })
        });
        transport
    }

    const CATALOG: &str = r#"{
        "name": "Test Catalog",
        "releases": [
            {"name": "A", "version": "1.0.0", "assets": [{"url": "https://example.com/1.0/A.dll"}, {"url": "https://example.com/1.0/A-old.dll"}]},
            {"name": "A", "version": "1.1.0", "assets": [{"url": "https://example.com/1.1/A.dll"}]},
            {"name": "A", "version": "1.2.0", "dependencies": [{"name": "C", "version": "1.0.0"}], "assets": [{"url": "https://example.com/1.2/A.dll"}]},
            {"name": "B", "version": "1.0.0", "dependencies": [{"name": "C", "version": "^1.0.0"}], "assets": [{"url": "https://example.com/B.dll", "targetDirectory": "B"}]},
            {"name": "B", "version": "1.1.0", "dependencies": [{"name": "C", "version": "^1.1.0"}], "assets": [{"url": "https://example.com/B.dll"}]},
            {"name": "C", "version": "1.0.0", "assets": [{"url": "https://example.com/1.0/C.dll"}]},
            {"name": "C", "version": "1.1.0", "assets": [{"url": "https://example.com/1.1/C.dll"}]},
            {"name": "Bags", "version": "2.0", "assets": [{"url": "https://example.com/Bags.zip"}]},
            {"name": "Pack", "version": "1.0", "assets": [{"url": "https://example.com/Pack.zip"}]},
            {"name": "Shared", "version": "1.0", "assets": [{"url": "https://example.com/Shared.dll"}]},
            {"name": "Broken", "version": "1.0", "dependencies": [{"name": "C", "version": "^1.0.0"}], "assets": [{"url": "https://example.com/broken.dll"}]},
            {"name": "Lonely", "version": "1.0", "dependencies": [{"name": "Nowhere", "version": "^1.0"}]}
        ]
    }"#;

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let description = dir.path().join("catalog.json");
        fs::write(&description, CATALOG).unwrap();

        let mut installer = ModInstaller::new(
            RealRuntime,
            transport(),
            dir.path().join("mod-installer"),
            dir.path().join("mods"),
            GithubEndpoints::default(),
        );
        let recorder = Arc::new(RecordingProgress::default());
        installer.subscribe_progress(recorder.clone());
        installer.initialize().unwrap();
        installer
            .register_source(&description.to_string_lossy())
            .await
            .unwrap();

        Fixture {
            dir,
            installer,
            recorder,
        }
    }

    #[tokio::test]
    async fn test_install_simple() {
        let mut f = fixture().await;

        f.install("A", "1.1.0").await.unwrap();

        assert_eq!(f.installed(), vec!["A 1.1.0"]);
        assert_eq!(
            fs::read_to_string(f.mods().join("A.dll")).unwrap(),
            "content of A.dll"
        );
        let installation = f.installer.installations().iter().next().unwrap();
        assert_eq!(installation.assets, vec!["A.dll"]);
        assert!(installation.source_definition.is_some());

        let saved = Installations::load(&RealRuntime, &f.installer.installations_path()).unwrap();
        assert_eq!(&saved, f.installer.installations());
    }

    #[test_log::test(tokio::test)]
    async fn test_install_dependencies_first() {
        let mut f = fixture().await;

        f.install("B", "1.0.0").await.unwrap();

        assert_eq!(f.installed(), vec!["C 1.1.0", "B 1.0.0"]);
        assert!(f.mods().join("B").join("B.dll").exists());
        assert!(f.mods().join("C.dll").exists());

        let installs: Vec<String> = f
            .recorder
            .events()
            .into_iter()
            .filter(|e| e.starts_with("step: Install"))
            .collect();
        assert_eq!(installs, vec!["step: Install C 1.1.0", "step: Install B 1.0.0"]);
    }

    #[tokio::test]
    async fn test_install_target_directory_ledger() {
        let mut f = fixture().await;

        f.install("B", "1.0.0").await.unwrap();

        let b = f
            .installer
            .installations()
            .with_name("B")
            .into_iter()
            .next()
            .unwrap();
        assert_eq!(b.assets, vec!["B/B.dll"]);
    }

    #[tokio::test]
    async fn test_upgrade_replaces_previous_version() {
        let mut f = fixture().await;
        f.install("A", "1.0.0").await.unwrap();
        assert!(f.mods().join("A-old.dll").exists());

        f.install("A", "1.1.0").await.unwrap();

        assert_eq!(f.installed(), vec!["A 1.1.0"]);
        assert!(!f.mods().join("A-old.dll").exists());
        assert_eq!(
            fs::read_to_string(f.mods().join("A.dll")).unwrap(),
            "content of A.dll"
        );
        assert!(f.installer.is_exact_version_installed(&f.def("A", "1.1.0")));
        assert!(f.installer.is_other_version_installed(&f.def("A", "1.0.0")));
    }

    #[test_log::test(tokio::test)]
    async fn test_conflict_leaves_everything_untouched() {
        let mut f = fixture().await;
        f.install("A", "1.2.0").await.unwrap();
        f.install("B", "1.0.0").await.unwrap();
        assert_eq!(f.installed(), vec!["C 1.0.0", "A 1.2.0", "B 1.0.0"]);

        let err = f.install("B", "1.1.0").await.unwrap_err();

        match as_installer_error(&err) {
            Some(ModInstallerError::UnresolvableDependency(group)) => {
                assert_eq!(group.to_string(), "C 1.0.0, C ^1.1.0")
            }
            other => panic!("Expected UnresolvableDependency, got {:?}", other),
        }
        assert_eq!(f.installed(), vec!["C 1.0.0", "A 1.2.0", "B 1.0.0"]);
        assert!(f.mods().join("B").join("B.dll").exists());
        assert!(f.recorder.events().iter().any(|e| e.starts_with("error: Unresolvable")));
    }

    #[tokio::test]
    async fn test_missing_dependency() {
        let mut f = fixture().await;

        let err = f.install("Lonely", "1.0").await.unwrap_err();

        assert!(matches!(
            as_installer_error(&err),
            Some(ModInstallerError::MissingDependency(_))
        ));
        assert!(f.installer.installations().is_empty());
    }

    #[tokio::test]
    async fn test_reinstall_is_noop() {
        let mut f = fixture().await;
        f.install("A", "1.1.0").await.unwrap();
        fs::remove_file(f.mods().join("A.dll")).unwrap();

        f.install("A", "1.1.0").await.unwrap();

        assert_eq!(f.installed(), vec!["A 1.1.0"]);
        assert!(!f.mods().join("A.dll").exists());
        assert!(
            f.recorder
                .details()
                .contains(&"A 1.1.0 is already installed.".to_string())
        );
    }

    #[tokio::test]
    async fn test_zip_install_skips_traversal_entries() {
        let mut f = fixture().await;

        f.install("Bags", "2.0").await.unwrap();

        assert!(f.mods().join("Bags").join("items.json").exists());
        assert!(!f.dir.path().join("evil.dll").exists());
        let installation = f.installer.installations().iter().next().unwrap();
        assert_eq!(installation.assets, vec!["Bags", "Bags/items.json"]);
        assert!(
            f.recorder
                .details()
                .contains(&"WARNING: Entry '../evil.dll' is invalid and will be ignored!".to_string())
        );
    }

    #[tokio::test]
    async fn test_uninstall_removes_emptied_directories() {
        let mut f = fixture().await;
        f.install("Bags", "2.0").await.unwrap();

        f.installer.uninstall_all("Bags").unwrap();

        assert!(f.installer.installations().is_empty());
        assert!(!f.mods().join("Bags").exists());
    }

    #[tokio::test]
    async fn test_uninstall_keeps_directories_with_foreign_files() {
        let mut f = fixture().await;
        f.install("Bags", "2.0").await.unwrap();
        fs::write(f.mods().join("Bags").join("user.cfg"), "mine").unwrap();

        f.installer.uninstall_all("Bags").unwrap();

        assert!(!f.mods().join("Bags").join("items.json").exists());
        assert!(f.mods().join("Bags").join("user.cfg").exists());
    }

    #[tokio::test]
    async fn test_shared_asset_survives_until_last_owner_is_removed() {
        let mut f = fixture().await;
        f.install("Pack", "1.0").await.unwrap();
        f.install("Shared", "1.0").await.unwrap();

        f.installer.uninstall_all("Pack").unwrap();
        assert!(!f.mods().join("Pack.dll").exists());
        assert!(f.mods().join("Shared.dll").exists());

        f.installer.uninstall_all("Shared").unwrap();
        assert!(!f.mods().join("Shared.dll").exists());
    }

    #[tokio::test]
    async fn test_uninstall_unknown_mod() {
        let mut f = fixture().await;

        let err = f.installer.uninstall_all("Nothing").unwrap_err();

        assert_eq!(
            as_installer_error(&err),
            Some(&ModInstallerError::NotInstalled("Nothing".to_string()))
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_install_keeps_completed_steps() {
        let mut f = fixture().await;

        let result = f.install("Broken", "1.0").await;

        assert!(result.is_err());
        assert_eq!(f.installed(), vec!["C 1.1.0"]);
        let saved = Installations::load(&RealRuntime, &f.installer.installations_path()).unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn test_change_listener_notified_after_install() {
        let mut f = fixture().await;
        let mut listener = MockChangeListener::new();
        listener.expect_changed().times(1).return_const(());
        let handle = f.installer.subscribe_installations_changed(Arc::new(listener));

        f.install("A", "1.1.0").await.unwrap();

        assert!(f.installer.unsubscribe_installations_changed(handle));
    }

    #[tokio::test]
    async fn test_queries() {
        let mut f = fixture().await;
        f.install("B", "1.0.0").await.unwrap();

        let c = f.def("C", "1.0.0");
        assert_eq!(f.installer.installed_version("C").as_deref(), Some("1.1.0"));
        assert_eq!(f.installer.installed_version("A"), None);
        assert!(f.installer.is_any_version_installed(&c));
        assert!(f.installer.is_other_version_installed(&c));
        assert!(f.installer.is_required_by_installation(&c));

        let required_by: Vec<String> = f
            .installer
            .get_required_by(&c)
            .iter()
            .map(|d| d.display_name())
            .collect();
        assert_eq!(required_by, vec!["A 1.2.0", "B 1.1.0", "Broken 1.0"]);

        let required: Vec<String> = f
            .installer
            .get_required(&f.def("B", "1.0.0"))
            .unwrap()
            .iter()
            .map(|d| d.display_name())
            .collect();
        assert_eq!(required, vec!["C 1.1.0"]);

        assert!(f.installer.get_required(&f.def("Lonely", "1.0")).is_err());
    }

    #[tokio::test]
    async fn test_initialize_restores_state() {
        let mut f = fixture().await;
        f.install("A", "1.1.0").await.unwrap();

        let mut restored = ModInstaller::new(
            RealRuntime,
            MockTransport::new(),
            f.installer.state_dir().to_path_buf(),
            f.mods(),
            GithubEndpoints::default(),
        );
        let mut sources_listener = MockChangeListener::new();
        sources_listener.expect_changed().times(1).return_const(());
        let mut installations_listener = MockChangeListener::new();
        installations_listener.expect_changed().times(1).return_const(());
        restored.subscribe_sources_changed(Arc::new(sources_listener));
        restored.subscribe_installations_changed(Arc::new(installations_listener));

        restored.initialize().unwrap();

        assert_eq!(restored.installations(), f.installer.installations());
        assert_eq!(restored.sources().len(), 1);
        assert!(!restored.are_sources_old());
        assert!(!restored.is_source_migration_required());
        assert_eq!(restored.latest_versions().len(), 8);
    }
}

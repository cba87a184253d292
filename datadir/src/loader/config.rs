use super::catalog::depersist;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::model::{GlobalConfig, Info, InfoKind, LoggingConfig, Settings, Workspace};
use crate::persist::{truncate_message, Deserializer, MAX_LOGGED_MESSAGE};
use crate::service::ServiceLoader;
use crate::walker::{DataDirectoryWalker, WorkspaceDirectory, GLOBAL_FILE, LOGGING_FILE};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Fills a [`ServerConfig`] whose catalog has already been loaded.
///
/// Runs inside the loader pool. As with the catalog, only walker errors are
/// fatal; a bad settings or service file is logged and left out.
pub struct ConfigLoader<'a> {
    walker: &'a DataDirectoryWalker,
    deserializer: &'a dyn Deserializer,
    service_loaders: &'a [Arc<dyn ServiceLoader>],
    config: &'a ServerConfig,
    loaded: AtomicUsize,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(
        walker: &'a DataDirectoryWalker,
        deserializer: &'a dyn Deserializer,
        service_loaders: &'a [Arc<dyn ServiceLoader>],
        config: &'a ServerConfig,
    ) -> Self {
        ConfigLoader {
            walker,
            deserializer,
            service_loaders,
            config,
            loaded: AtomicUsize::new(0),
        }
    }

    /// Number of configuration files read so far.
    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::Relaxed)
    }

    pub fn load(&self) -> Result<()> {
        let started = Instant::now();
        let root_files = self.walker.root_files()?;

        if root_files.contains(GLOBAL_FILE) {
            let path = self.walker.root().join(GLOBAL_FILE);
            if let Some(global) = self.depersist::<GlobalConfig>(&path, InfoKind::Global) {
                self.config.set_global(global);
            }
        } else {
            log::info!("No {GLOBAL_FILE} in {}", self.walker.root().display());
        }
        if root_files.contains(LOGGING_FILE) {
            let path = self.walker.root().join(LOGGING_FILE);
            if let Some(logging) = self.depersist::<LoggingConfig>(&path, InfoKind::Logging) {
                self.config.set_logging(logging);
            }
        } else {
            log::info!("No {LOGGING_FILE} in {}", self.walker.root().display());
        }

        for loader in self.service_loaders {
            if root_files.contains(loader.filename()) {
                self.load_service(loader.as_ref(), self.walker.root(), None);
            } else {
                log::info!("No global {} service configuration", loader.kind());
            }
        }

        let workspaces = self.walker.workspaces()?;
        workspaces.par_iter().for_each(|dir| self.load_workspace(dir));

        let counts = self.config.counts();
        log::info!(
            "Loaded {} settings, {} global and {} workspace services from {} files in {:?}",
            counts.settings,
            counts.global_services,
            counts.workspace_services,
            self.loaded(),
            started.elapsed()
        );
        Ok(())
    }

    /// Settings and services of one workspace directory. The workspace is
    /// the one its `workspace.xml` describes, whatever the directory is
    /// called; when the catalog does not hold it the directory is skipped.
    fn load_workspace(&self, dir: &WorkspaceDirectory) {
        let catalog = self.config.catalog();
        let workspace = self
            .depersist::<Workspace>(&dir.workspace_file, InfoKind::Workspace)
            .and_then(|ws| catalog.workspace(&ws.id).filter(|found| found.name == ws.name));
        let Some(workspace) = workspace else {
            log::warn!(
                "Workspace of {} is not in the catalog, skipping its settings and services",
                dir.path.display()
            );
            return;
        };

        if let Some(path) = dir.settings_file.as_deref() {
            if let Some(settings) = self.depersist::<Settings>(path, InfoKind::Settings) {
                match settings.workspace.as_deref() {
                    Some(id) if id == workspace.id => {
                        if let Err(e) = self.config.add_settings(settings) {
                            log::error!("Error adding settings of workspace '{}': {e}", workspace.name);
                        }
                    }
                    Some(id) => log::warn!(
                        "Settings in {} belong to workspace {id}, not '{}', ignored",
                        path.display(),
                        workspace.name
                    ),
                    None => log::warn!(
                        "Settings in {} have no resolvable workspace, ignored",
                        path.display()
                    ),
                }
            }
        }

        self.service_loaders
            .par_iter()
            .filter(|loader| dir.has_file(loader.filename()))
            .for_each(|loader| self.load_service(loader.as_ref(), &dir.path, Some(workspace.id.as_str())));
    }

    /// Load one service. A workspace service must name the workspace whose
    /// directory it sits in; a global one must name none.
    fn load_service(&self, loader: &dyn ServiceLoader, dir: &Path, workspace_id: Option<&str>) {
        let service = match loader.load(self.config, dir) {
            Ok(service) => service,
            Err(e) => {
                log::error!(
                    "Error loading {} service from {}: {}",
                    loader.kind(),
                    dir.display(),
                    truncate_message(&e.to_string(), MAX_LOGGED_MESSAGE)
                );
                return;
            }
        };
        self.loaded.fetch_add(1, Ordering::Relaxed);

        let actual = service.workspace.as_deref();
        if actual != workspace_id {
            match (workspace_id, actual) {
                (Some(expected), Some(actual)) => log::warn!(
                    "{} service in {} belongs to workspace {actual}, not {expected}, ignored",
                    loader.kind(),
                    dir.display()
                ),
                (Some(_), None) => log::warn!(
                    "{} service in {} has no workspace, ignored",
                    loader.kind(),
                    dir.display()
                ),
                (None, _) => log::warn!(
                    "Global {} service in {} names a workspace, ignored",
                    loader.kind(),
                    dir.display()
                ),
            }
            return;
        }

        let name = service.name.clone();
        match self.config.add_service(service) {
            Ok(()) => log::debug!("Added {} service '{name}'", loader.kind()),
            Err(e) => log::error!("Error adding {} service '{name}': {e}", loader.kind()),
        }
    }

    fn depersist<T: TryFrom<Info, Error = Info>>(&self, path: &Path, kind: InfoKind) -> Option<T> {
        depersist(self.deserializer, self.config.catalog(), &self.loaded, path, kind)
    }
}

//! Server configuration: global and logging singletons, per-workspace
//! settings, and service configurations. Safe for concurrent additions.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::model::{GlobalConfig, LoggingConfig, Service, Settings};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct ConfigState {
    global: Option<GlobalConfig>,
    logging: Option<LoggingConfig>,
    /// Keyed by workspace id.
    settings: HashMap<String, Arc<Settings>>,
    services: Vec<Arc<Service>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfigCounts {
    pub settings: usize,
    pub global_services: usize,
    pub workspace_services: usize,
}

pub struct ServerConfig {
    catalog: Arc<Catalog>,
    state: RwLock<ConfigState>,
}

impl ServerConfig {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        ServerConfig {
            catalog,
            state: RwLock::new(ConfigState::default()),
        }
    }

    /// The catalog workspace references are resolved against.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn read(&self) -> RwLockReadGuard<'_, ConfigState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConfigState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn global(&self) -> Option<GlobalConfig> {
        self.read().global.clone()
    }

    pub fn set_global(&self, global: GlobalConfig) {
        self.write().global = Some(global);
    }

    pub fn logging(&self) -> Option<LoggingConfig> {
        self.read().logging.clone()
    }

    pub fn set_logging(&self, logging: LoggingConfig) {
        self.write().logging = Some(logging);
    }

    /// Install factory defaults for whichever singleton is still missing.
    pub fn ensure_defaults(&self) {
        let mut state = self.write();
        if state.global.is_none() {
            log::info!("No global configuration loaded, using defaults");
            state.global = Some(GlobalConfig::default());
        }
        if state.logging.is_none() {
            log::info!("No logging configuration loaded, using defaults");
            state.logging = Some(LoggingConfig::default());
        }
    }

    /// Add workspace settings. The workspace must exist in the catalog and
    /// must not have settings yet.
    pub fn add_settings(&self, settings: Settings) -> Result<()> {
        let workspace = settings
            .workspace
            .clone()
            .filter(|id| self.catalog.workspace(id).is_some())
            .ok_or_else(|| Error::UnresolvedReference {
                kind: "settings",
                name: settings.id.clone(),
                reference: "workspace",
            })?;
        let mut state = self.write();
        if state.settings.contains_key(&workspace)
            || state.settings.values().any(|s| s.id == settings.id)
        {
            return Err(Error::Duplicate {
                kind: "settings",
                name: settings.id,
            });
        }
        state.settings.insert(workspace, Arc::new(settings));
        Ok(())
    }

    pub fn settings(&self, workspace_id: &str) -> Option<Arc<Settings>> {
        self.read().settings.get(workspace_id).cloned()
    }

    /// Add a service. Only one service of a kind may exist per scope.
    pub fn add_service(&self, service: Service) -> Result<()> {
        if let Some(workspace) = service.workspace.as_deref() {
            if self.catalog.workspace(workspace).is_none() {
                return Err(Error::UnresolvedReference {
                    kind: "service",
                    name: service.name,
                    reference: "workspace",
                });
            }
        }
        let mut state = self.write();
        let clash = state.services.iter().any(|s| {
            s.id == service.id || (s.kind == service.kind && s.workspace == service.workspace)
        });
        if clash {
            return Err(Error::Duplicate {
                kind: "service",
                name: service.name,
            });
        }
        state.services.push(Arc::new(service));
        Ok(())
    }

    /// Look a service up by kind, globally when `workspace_id` is `None`.
    pub fn service(&self, kind: &str, workspace_id: Option<&str>) -> Option<Arc<Service>> {
        self.read()
            .services
            .iter()
            .find(|s| s.kind == kind && s.workspace.as_deref() == workspace_id)
            .cloned()
    }

    pub fn service_by_id(&self, id: &str) -> Option<Arc<Service>> {
        self.read().services.iter().find(|s| s.id == id).cloned()
    }

    pub fn services(&self) -> Vec<Arc<Service>> {
        self.read().services.clone()
    }

    pub fn counts(&self) -> ConfigCounts {
        let state = self.read();
        let workspace_services = state
            .services
            .iter()
            .filter(|s| s.workspace.is_some())
            .count();
        ConfigCounts {
            settings: state.settings.len(),
            global_services: state.services.len() - workspace_services,
            workspace_services,
        }
    }
}

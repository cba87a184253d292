//! In-memory catalog of workspaces, namespaces, stores, resources, layers,
//! layer groups and styles.
//!
//! Every operation takes `&self`; the state sits behind a single `RwLock`, so
//! loader workers can add entities concurrently. Additions are validated
//! under the write lock and either applied whole or rejected.

mod validation;

use crate::error::{Error, Result};
use crate::model::{Info, Layer, LayerGroup, Namespace, Resource, Store, Style, Workspace};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
pub(crate) struct CatalogState {
    pub(crate) workspaces: HashMap<String, Arc<Workspace>>,
    pub(crate) namespaces: HashMap<String, Arc<Namespace>>,
    pub(crate) stores: HashMap<String, Arc<Store>>,
    pub(crate) resources: HashMap<String, Arc<Resource>>,
    pub(crate) layers: HashMap<String, Arc<Layer>>,
    pub(crate) layer_groups: HashMap<String, Arc<LayerGroup>>,
    pub(crate) styles: HashMap<String, Arc<Style>>,
    default_workspace: Option<String>,
    default_namespace: Option<String>,
}

/// Number of entities of each kind, e.g. to compare two loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub workspaces: usize,
    pub namespaces: usize,
    pub stores: usize,
    pub resources: usize,
    pub layers: usize,
    pub layer_groups: usize,
    pub styles: usize,
}

pub struct Catalog {
    state: RwLock<CatalogState>,
    extended_validation: AtomicBool,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// An empty catalog with extended validation enabled.
    pub fn new() -> Self {
        Catalog {
            state: RwLock::new(CatalogState::default()),
            extended_validation: AtomicBool::new(true),
        }
    }

    pub fn is_extended_validation(&self) -> bool {
        self.extended_validation.load(Ordering::Acquire)
    }

    /// Toggle the checks that only make sense once the catalog is complete
    /// (default styles present, resource/namespace agreement, ...).
    pub fn set_extended_validation(&self, enabled: bool) {
        self.extended_validation.store(enabled, Ordering::Release);
    }

    fn read(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Additions ────────────────────────────────────────────────────

    /// Add any catalog entity. Configuration variants are rejected.
    pub fn add(&self, info: Info) -> Result<()> {
        match info {
            Info::Workspace(w) => self.add_workspace(w),
            Info::Namespace(n) => self.add_namespace(n),
            Info::Store(s) => self.add_store(s),
            Info::Resource(r) => self.add_resource(r),
            Info::Layer(l) => self.add_layer(l),
            Info::LayerGroup(g) => self.add_layer_group(g),
            Info::Style(s) => self.add_style(s),
            other => Err(Error::Rejected {
                kind: other.kind().label(),
                name: other.name().to_string(),
                reason: "not a catalog entity".into(),
            }),
        }
    }

    pub fn add_workspace(&self, workspace: Workspace) -> Result<()> {
        let mut state = self.write();
        validation::validate_workspace(&state, &workspace)?;
        state
            .workspaces
            .insert(workspace.id.clone(), Arc::new(workspace));
        Ok(())
    }

    pub fn add_namespace(&self, namespace: Namespace) -> Result<()> {
        let mut state = self.write();
        validation::validate_namespace(&state, &namespace)?;
        state
            .namespaces
            .insert(namespace.id.clone(), Arc::new(namespace));
        Ok(())
    }

    /// Add a workspace and its namespace as one unit: both are validated
    /// before either is inserted.
    pub fn add_workspace_with_namespace(
        &self,
        workspace: Workspace,
        namespace: Namespace,
    ) -> Result<()> {
        let mut state = self.write();
        validation::validate_workspace(&state, &workspace)?;
        validation::validate_namespace(&state, &namespace)?;
        state
            .workspaces
            .insert(workspace.id.clone(), Arc::new(workspace));
        state
            .namespaces
            .insert(namespace.id.clone(), Arc::new(namespace));
        Ok(())
    }

    pub fn add_store(&self, store: Store) -> Result<()> {
        let mut state = self.write();
        validation::validate_store(&state, &store)?;
        state.stores.insert(store.id.clone(), Arc::new(store));
        Ok(())
    }

    pub fn add_resource(&self, resource: Resource) -> Result<()> {
        let extended = self.is_extended_validation();
        let mut state = self.write();
        validation::validate_resource(&state, &resource, extended)?;
        state
            .resources
            .insert(resource.id.clone(), Arc::new(resource));
        Ok(())
    }

    pub fn add_layer(&self, layer: Layer) -> Result<()> {
        let extended = self.is_extended_validation();
        let mut state = self.write();
        validation::validate_layer(&state, &layer, extended)?;
        state.layers.insert(layer.id.clone(), Arc::new(layer));
        Ok(())
    }

    pub fn add_layer_group(&self, group: LayerGroup) -> Result<()> {
        let extended = self.is_extended_validation();
        let mut state = self.write();
        validation::validate_layer_group(&state, &group, extended)?;
        state.layer_groups.insert(group.id.clone(), Arc::new(group));
        Ok(())
    }

    pub fn add_style(&self, style: Style) -> Result<()> {
        let extended = self.is_extended_validation();
        let mut state = self.write();
        validation::validate_style(&state, &style, extended)?;
        state.styles.insert(style.id.clone(), Arc::new(style));
        Ok(())
    }

    // ── Defaults ─────────────────────────────────────────────────────

    /// Make `workspace_id` the default workspace, and the namespace whose
    /// prefix matches its name the default namespace.
    pub fn set_default_workspace(&self, workspace_id: &str) -> Result<()> {
        let mut state = self.write();
        let workspace = state.workspaces.get(workspace_id).cloned().ok_or_else(|| {
            Error::UnresolvedReference {
                kind: "default workspace",
                name: workspace_id.to_string(),
                reference: "workspace",
            }
        })?;
        let namespace = state
            .namespaces
            .values()
            .find(|ns| ns.prefix == workspace.name)
            .map(|ns| ns.id.clone());
        state.default_workspace = Some(workspace.id.clone());
        state.default_namespace = namespace;
        Ok(())
    }

    pub fn default_workspace(&self) -> Option<Arc<Workspace>> {
        let state = self.read();
        state
            .default_workspace
            .as_ref()
            .and_then(|id| state.workspaces.get(id).cloned())
    }

    pub fn default_namespace(&self) -> Option<Arc<Namespace>> {
        let state = self.read();
        state
            .default_namespace
            .as_ref()
            .and_then(|id| state.namespaces.get(id).cloned())
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn workspace(&self, id: &str) -> Option<Arc<Workspace>> {
        self.read().workspaces.get(id).cloned()
    }

    pub fn workspace_by_name(&self, name: &str) -> Option<Arc<Workspace>> {
        self.read()
            .workspaces
            .values()
            .find(|w| w.name == name)
            .cloned()
    }

    pub fn namespace(&self, id: &str) -> Option<Arc<Namespace>> {
        self.read().namespaces.get(id).cloned()
    }

    pub fn namespace_by_prefix(&self, prefix: &str) -> Option<Arc<Namespace>> {
        self.read()
            .namespaces
            .values()
            .find(|n| n.prefix == prefix)
            .cloned()
    }

    pub fn store(&self, id: &str) -> Option<Arc<Store>> {
        self.read().stores.get(id).cloned()
    }

    pub fn store_by_name(&self, workspace_id: &str, name: &str) -> Option<Arc<Store>> {
        self.read()
            .stores
            .values()
            .find(|s| s.name == name && s.workspace.as_deref() == Some(workspace_id))
            .cloned()
    }

    pub fn resource(&self, id: &str) -> Option<Arc<Resource>> {
        self.read().resources.get(id).cloned()
    }

    pub fn layer(&self, id: &str) -> Option<Arc<Layer>> {
        self.read().layers.get(id).cloned()
    }

    /// Find a layer by `workspace:name`.
    pub fn layer_by_name(&self, prefixed_name: &str) -> Option<Arc<Layer>> {
        let (workspace, name) = prefixed_name.split_once(':')?;
        let state = self.read();
        let workspace = state.workspaces.values().find(|w| w.name == workspace)?;
        state
            .layers
            .values()
            .find(|l| {
                l.name == name
                    && validation::layer_workspace(&state, l) == Some(workspace.id.as_str())
            })
            .cloned()
    }

    /// Workspace a layer is published in, through its resource and store.
    pub fn layer_workspace(&self, layer: &Layer) -> Option<Arc<Workspace>> {
        let state = self.read();
        let id = validation::layer_workspace(&state, layer)?;
        state.workspaces.get(id).cloned()
    }

    pub fn layer_group(&self, id: &str) -> Option<Arc<LayerGroup>> {
        self.read().layer_groups.get(id).cloned()
    }

    pub fn style(&self, id: &str) -> Option<Arc<Style>> {
        self.read().styles.get(id).cloned()
    }

    /// Find a style by name, globally when `workspace_id` is `None`.
    pub fn style_by_name(&self, workspace_id: Option<&str>, name: &str) -> Option<Arc<Style>> {
        self.read()
            .styles
            .values()
            .find(|s| s.name == name && s.workspace.as_deref() == workspace_id)
            .cloned()
    }

    /// Resolve a workspace reference written either as an id or a name.
    pub fn resolve_workspace(&self, reference: &str) -> Option<Arc<Workspace>> {
        self.workspace(reference)
            .or_else(|| self.workspace_by_name(reference))
    }

    /// Resolve a namespace reference written either as an id or a prefix.
    pub fn resolve_namespace(&self, reference: &str) -> Option<Arc<Namespace>> {
        self.namespace(reference)
            .or_else(|| self.namespace_by_prefix(reference))
    }

    /// Resolve a store reference written as an id, as `workspace:name`, or as
    /// a bare name looked up in `workspace_id` only.
    pub fn resolve_store(&self, workspace_id: Option<&str>, reference: &str) -> Option<Arc<Store>> {
        if let Some(store) = self.store(reference) {
            return Some(store);
        }
        if let Some((workspace, name)) = reference.split_once(':') {
            let workspace = self.workspace_by_name(workspace)?;
            return self.store_by_name(&workspace.id, name);
        }
        self.store_by_name(workspace_id?, reference)
    }

    pub fn resolve_resource(&self, reference: &str) -> Option<Arc<Resource>> {
        self.resource(reference)
    }

    /// Styles resolve by id first, then by name in `workspace_id`, then by
    /// name among global styles.
    pub fn resolve_style(&self, workspace_id: Option<&str>, reference: &str) -> Option<Arc<Style>> {
        self.style(reference)
            .or_else(|| workspace_id.and_then(|ws| self.style_by_name(Some(ws), reference)))
            .or_else(|| self.style_by_name(None, reference))
    }

    // ── Listings ─────────────────────────────────────────────────────

    /// All workspaces, sorted by name.
    pub fn workspaces(&self) -> Vec<Arc<Workspace>> {
        let mut all: Vec<_> = self.read().workspaces.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn namespaces(&self) -> Vec<Arc<Namespace>> {
        let mut all: Vec<_> = self.read().namespaces.values().cloned().collect();
        all.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        all
    }

    pub fn stores(&self) -> Vec<Arc<Store>> {
        sorted_by_name(self.read().stores.values().cloned().collect(), |s| (&s.name, &s.id))
    }

    pub fn resources(&self) -> Vec<Arc<Resource>> {
        sorted_by_name(self.read().resources.values().cloned().collect(), |r| (&r.name, &r.id))
    }

    pub fn layers(&self) -> Vec<Arc<Layer>> {
        sorted_by_name(self.read().layers.values().cloned().collect(), |l| (&l.name, &l.id))
    }

    pub fn layer_groups(&self) -> Vec<Arc<LayerGroup>> {
        sorted_by_name(self.read().layer_groups.values().cloned().collect(), |g| (&g.name, &g.id))
    }

    pub fn styles(&self) -> Vec<Arc<Style>> {
        sorted_by_name(self.read().styles.values().cloned().collect(), |s| (&s.name, &s.id))
    }

    pub fn counts(&self) -> CatalogCounts {
        let state = self.read();
        CatalogCounts {
            workspaces: state.workspaces.len(),
            namespaces: state.namespaces.len(),
            stores: state.stores.len(),
            resources: state.resources.len(),
            layers: state.layers.len(),
            layer_groups: state.layer_groups.len(),
            styles: state.styles.len(),
        }
    }
}

/// Sort by name, ties broken by id, so listings are stable across loads.
fn sorted_by_name<T>(
    mut items: Vec<Arc<T>>,
    key: impl Fn(&T) -> (&String, &String),
) -> Vec<Arc<T>> {
    items.sort_by(|a, b| key(a).cmp(&key(b)));
    items
}

use crate::catalog::Catalog;
use crate::error::Result;
use crate::model::{
    Info, InfoKind, Layer, LayerGroup, Namespace, Resource, ResourceKind, Store, Style, Workspace,
};
use crate::persist::{truncate_message, Deserializer, MAX_LOGGED_MESSAGE};
use crate::walker::{DataDirectoryWalker, LayerDirectory, StoreDirectory, WorkspaceDirectory};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_POINT_STYLE: &str = "point";
pub const DEFAULT_LINE_STYLE: &str = "line";
pub const DEFAULT_POLYGON_STYLE: &str = "polygon";
pub const DEFAULT_RASTER_STYLE: &str = "raster";
pub const DEFAULT_GENERIC_STYLE: &str = "generic";

/// Well-known styles and the style file each one points at.
pub const DEFAULT_STYLES: [(&str, &str); 5] = [
    (DEFAULT_POINT_STYLE, "default_point.sld"),
    (DEFAULT_LINE_STYLE, "default_line.sld"),
    (DEFAULT_POLYGON_STYLE, "default_polygon.sld"),
    (DEFAULT_RASTER_STYLE, "default_raster.sld"),
    (DEFAULT_GENERIC_STYLE, "default_generic.sld"),
];

/// Fills a catalog from the walker's structure.
///
/// Must run inside the loader pool: every level of the tree fans out with
/// rayon's parallel iterators. Only walker errors abort the load; a file that
/// fails to parse or an entity the catalog rejects is logged and skipped, and
/// whatever depended on it is never attempted.
pub struct CatalogLoader<'a> {
    walker: &'a DataDirectoryWalker,
    deserializer: &'a dyn Deserializer,
    catalog: &'a Catalog,
    loaded: AtomicUsize,
}

impl<'a> CatalogLoader<'a> {
    pub fn new(
        walker: &'a DataDirectoryWalker,
        deserializer: &'a dyn Deserializer,
        catalog: &'a Catalog,
    ) -> Self {
        CatalogLoader {
            walker,
            deserializer,
            catalog,
            loaded: AtomicUsize::new(0),
        }
    }

    /// Number of files deserialized so far.
    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::Relaxed)
    }

    /// Extended validation is switched off and left off; the caller turns it
    /// back on once startup is complete.
    pub fn load(&self) -> Result<()> {
        let started = Instant::now();
        self.catalog.set_extended_validation(false);

        self.load_styles(None, &self.walker.global_styles()?);
        self.initialize_default_styles();

        let workspaces = self.walker.workspaces()?;
        workspaces
            .par_iter()
            .try_for_each(|dir| self.load_workspace(dir))?;
        self.set_default_workspace();

        self.load_layer_groups(None, &self.walker.global_layer_groups()?);

        log::info!(
            "Loaded {} catalog files from {} in {:?}",
            self.loaded(),
            self.walker.root().display(),
            started.elapsed()
        );
        Ok(())
    }

    fn load_workspace(&self, dir: &WorkspaceDirectory) -> Result<()> {
        let Some(namespace_file) = dir.namespace_file.as_deref() else {
            log::warn!(
                "Workspace directory {} has no namespace descriptor, ignored",
                dir.path.display()
            );
            return Ok(());
        };
        let workspace = self.depersist::<Workspace>(&dir.workspace_file, InfoKind::Workspace);
        let namespace = self.depersist::<Namespace>(namespace_file, InfoKind::Namespace);
        let (Some(workspace), Some(namespace)) = (workspace, namespace) else {
            return Ok(());
        };

        let workspace_id = workspace.id.clone();
        let name = workspace.name.clone();
        if let Err(e) = self
            .catalog
            .add_workspace_with_namespace(workspace, namespace)
        {
            log::error!("Error adding workspace '{name}' to the catalog: {e}");
            return Ok(());
        }
        log::debug!("Added workspace {name}[{workspace_id}]");

        self.load_styles(Some(&workspace_id), &dir.styles()?);
        dir.stores()?
            .par_iter()
            .try_for_each(|store| self.load_store(&workspace_id, store))?;
        self.load_layer_groups(Some(&workspace_id), &dir.layer_groups()?);
        Ok(())
    }

    fn load_store(&self, workspace_id: &str, dir: &StoreDirectory) -> Result<()> {
        let Some(store) = self.depersist::<Store>(&dir.store_file, InfoKind::Store(dir.kind)) else {
            return Ok(());
        };
        if store.workspace.is_none() {
            log::warn!(
                "Store '{}' at {} has no resolvable workspace, ignored",
                store.name,
                dir.store_file.display()
            );
            return Ok(());
        }
        let store_id = store.id.clone();
        if !self.add(Info::Store(store)) {
            return Ok(());
        }
        dir.layers()?
            .par_iter()
            .for_each(|layer| self.load_resource_and_layer(workspace_id, &store_id, layer));
        Ok(())
    }

    /// The resource must name the store whose directory it sits in. A bare
    /// store name is looked up in the directory's workspace only.
    fn load_resource_and_layer(&self, workspace_id: &str, store_id: &str, dir: &LayerDirectory) {
        let kind = InfoKind::Resource(dir.resource_kind);
        let Some(mut resource) = self.depersist::<Resource>(&dir.resource_file, kind) else {
            return;
        };
        let store = resource
            .store
            .as_deref()
            .and_then(|r| self.catalog.resolve_store(Some(workspace_id), r));
        match store {
            None => {
                log::warn!(
                    "Resource '{}' at {} has no resolvable store, ignored",
                    resource.name,
                    dir.resource_file.display()
                );
                return;
            }
            Some(store) if store.id != store_id => {
                log::warn!(
                    "Resource '{}' at {} names store {} but sits under store {store_id}, ignored",
                    resource.name,
                    dir.resource_file.display(),
                    store.id
                );
                return;
            }
            Some(store) => resource.store = Some(store.id.clone()),
        }
        let resource_kind = resource.kind;
        if !self.add(Info::Resource(resource)) {
            return;
        }

        let Some(mut layer) = self.depersist::<Layer>(&dir.layer_file, InfoKind::Layer) else {
            return;
        };
        if layer.resource.is_none() {
            log::warn!(
                "Layer '{}' at {} has no resolvable resource, ignored",
                layer.name,
                dir.layer_file.display()
            );
            return;
        }
        self.resolve_layer_styles(&mut layer, workspace_id, resource_kind);
        self.add(Info::Layer(layer));
    }

    /// Resolve the layer's style references in its workspace, then among
    /// global styles. A default style or style list entry that is missing or
    /// belongs to another workspace is replaced with the generic style for
    /// the layer's resource kind.
    fn resolve_layer_styles(&self, layer: &mut Layer, workspace_id: &str, kind: ResourceKind) {
        let fallback = if kind == ResourceKind::FeatureType {
            DEFAULT_GENERIC_STYLE
        } else {
            DEFAULT_RASTER_STYLE
        };
        let fallback = self.catalog.style_by_name(None, fallback);
        let fallback_id = fallback.as_ref().map(|s| s.id.clone());
        let fallback_name = fallback.as_ref().map(|s| s.name.as_str()).unwrap_or("<none>");

        let default_style = layer.default_style.take();
        layer.default_style = match default_style.as_deref() {
            None => {
                log::error!(
                    "Layer '{}' has no default style, assigned '{fallback_name}'",
                    layer.name
                );
                fallback_id.clone()
            }
            Some(reference) => match self.visible_style(reference, workspace_id) {
                Ok(id) => Some(id),
                Err(reason) => {
                    log::error!(
                        "Layer '{}' default style '{reference}' {reason}, assigned '{fallback_name}'",
                        layer.name
                    );
                    fallback_id.clone()
                }
            },
        };

        let mut styles: Vec<String> = Vec::with_capacity(layer.styles.len());
        for reference in std::mem::take(&mut layer.styles) {
            let id = match self.visible_style(&reference, workspace_id) {
                Ok(id) => Some(id),
                Err(reason) => {
                    log::error!(
                        "Layer '{}' style '{reference}' {reason}, assigned '{fallback_name}'",
                        layer.name
                    );
                    fallback_id.clone()
                }
            };
            if let Some(id) = id {
                if !styles.contains(&id) {
                    styles.push(id);
                }
            }
        }
        layer.styles = styles;
    }

    /// Id of the style `reference` names, or why the layer cannot use it.
    fn visible_style(
        &self,
        reference: &str,
        workspace_id: &str,
    ) -> std::result::Result<String, &'static str> {
        match self.catalog.resolve_style(Some(workspace_id), reference) {
            None => Err("does not exist"),
            Some(style) if !visible_from(&style, workspace_id) => {
                Err("belongs to another workspace")
            }
            Some(style) => Ok(style.id.clone()),
        }
    }

    fn load_styles(&self, workspace_id: Option<&str>, files: &[PathBuf]) {
        files.par_iter().for_each(|file| {
            let Some(style) = self.depersist::<Style>(file, InfoKind::Style) else {
                return;
            };
            if scope_matches("Style", &style.name, workspace_id, style.workspace.as_deref()) {
                self.add(Info::Style(style));
            }
        });
    }

    fn load_layer_groups(&self, workspace_id: Option<&str>, files: &[PathBuf]) {
        files.par_iter().for_each(|file| {
            let Some(group) = self.depersist::<LayerGroup>(file, InfoKind::LayerGroup) else {
                return;
            };
            if scope_matches("Layer group", &group.name, workspace_id, group.workspace.as_deref()) {
                self.add(Info::LayerGroup(group));
            }
        });
    }

    /// Add the well-known styles the data directory does not define.
    fn initialize_default_styles(&self) {
        for (name, filename) in DEFAULT_STYLES {
            if self.catalog.style_by_name(None, name).is_some() {
                continue;
            }
            let style = Style {
                id: format!("style-default-{name}"),
                name: name.to_string(),
                workspace: None,
                filename: Some(filename.to_string()),
                format: Some("sld".into()),
            };
            if self.add(Info::Style(style)) {
                log::info!("Initialized default style '{name}'");
            }
        }
    }

    /// Use `workspaces/default.xml` when it names a loaded workspace, otherwise
    /// the workspace whose name sorts first.
    fn set_default_workspace(&self) {
        let named = self
            .walker
            .default_workspace()
            .and_then(|path| self.depersist::<Workspace>(&path, InfoKind::Workspace))
            .and_then(|ws| {
                self.catalog
                    .workspace(&ws.id)
                    .or_else(|| self.catalog.workspace_by_name(&ws.name))
            });
        let chosen = match named {
            Some(ws) => Some(ws),
            None => {
                let first = self.catalog.workspaces().into_iter().next();
                if let Some(ws) = &first {
                    log::info!("No usable default workspace file, defaulting to '{}'", ws.name);
                }
                first
            }
        };
        if let Some(ws) = chosen {
            if let Err(e) = self.catalog.set_default_workspace(&ws.id) {
                log::error!("Cannot set the default workspace to '{}': {e}", ws.name);
            }
        }
    }

    /// Add to the catalog, logging and swallowing rejections.
    fn add(&self, info: Info) -> bool {
        let kind = info.kind().label();
        let name = info.name().to_string();
        match self.catalog.add(info) {
            Ok(()) => {
                log::debug!("Added {kind} '{name}' to the catalog");
                true
            }
            Err(e) => {
                log::error!("Error adding {kind} '{name}' to the catalog: {e}");
                false
            }
        }
    }

    fn depersist<T: TryFrom<Info, Error = Info>>(&self, path: &Path, kind: InfoKind) -> Option<T> {
        depersist(self.deserializer, self.catalog, &self.loaded, path, kind)
    }
}

/// Deserialize one file as `T`, logging instead of failing.
pub(super) fn depersist<T: TryFrom<Info, Error = Info>>(
    deserializer: &dyn Deserializer,
    catalog: &Catalog,
    counter: &AtomicUsize,
    path: &Path,
    kind: InfoKind,
) -> Option<T> {
    match deserializer.depersist(path, kind, catalog) {
        Ok(info) => {
            counter.fetch_add(1, Ordering::Relaxed);
            match T::try_from(info) {
                Ok(value) => Some(value),
                Err(other) => {
                    log::error!(
                        "Expected a {} in {} but got a {}",
                        kind.label(),
                        path.display(),
                        other.kind().label()
                    );
                    None
                }
            }
        }
        Err(e) => {
            log::error!(
                "Error loading {} from {}: {}",
                kind.label(),
                path.display(),
                truncate_message(&e.to_string(), MAX_LOGGED_MESSAGE)
            );
            None
        }
    }
}

fn visible_from(style: &Arc<Style>, workspace_id: &str) -> bool {
    style.workspace.as_deref().map_or(true, |ws| ws == workspace_id)
}

/// Global files must carry no workspace; workspace files must carry theirs.
fn scope_matches(what: &str, name: &str, expected: Option<&str>, actual: Option<&str>) -> bool {
    match (expected, actual) {
        (None, None) => true,
        (Some(expected), Some(actual)) if expected == actual => true,
        (None, Some(actual)) => {
            log::error!("{what} '{name}' is global but has workspace {actual}, ignored");
            false
        }
        (Some(expected), None) => {
            log::error!("{what} '{name}' should have workspace {expected} but has none, ignored");
            false
        }
        (Some(expected), Some(actual)) => {
            log::error!(
                "{what} '{name}' should have workspace {expected} but has workspace {actual}, ignored"
            );
            false
        }
    }
}

use super::CatalogState;
use crate::error::{Error, Result};
use crate::model::{Layer, LayerGroup, Namespace, Resource, Store, Style, Workspace};

fn require(kind: &'static str, name: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Rejected {
            kind,
            name: name.to_string(),
            reason: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

fn duplicate(kind: &'static str, name: &str) -> Error {
    Error::Duplicate {
        kind,
        name: name.to_string(),
    }
}

fn unresolved(kind: &'static str, name: &str, reference: &'static str) -> Error {
    Error::UnresolvedReference {
        kind,
        name: name.to_string(),
        reference,
    }
}

/// Workspace id of the store a resource belongs to.
pub(super) fn resource_workspace<'a>(state: &'a CatalogState, resource: &Resource) -> Option<&'a str> {
    let store = state.stores.get(resource.store.as_deref()?)?;
    store.workspace.as_deref()
}

/// Workspace id a layer is published in, through its resource and store.
pub(super) fn layer_workspace<'a>(state: &'a CatalogState, layer: &Layer) -> Option<&'a str> {
    let resource = state.resources.get(layer.resource.as_deref()?)?;
    resource_workspace(state, resource)
}

fn check_workspace_ref(
    state: &CatalogState,
    kind: &'static str,
    name: &str,
    workspace: Option<&str>,
) -> Result<()> {
    match workspace {
        Some(id) if !state.workspaces.contains_key(id) => Err(unresolved(kind, name, "workspace")),
        _ => Ok(()),
    }
}

pub(super) fn validate_workspace(state: &CatalogState, workspace: &Workspace) -> Result<()> {
    require("workspace", &workspace.name, "id", &workspace.id)?;
    require("workspace", &workspace.name, "name", &workspace.name)?;
    if workspace.name.contains(':') {
        return Err(Error::Rejected {
            kind: "workspace",
            name: workspace.name.clone(),
            reason: "name must not contain ':'".into(),
        });
    }
    if state.workspaces.contains_key(&workspace.id)
        || state.workspaces.values().any(|w| w.name == workspace.name)
    {
        return Err(duplicate("workspace", &workspace.name));
    }
    Ok(())
}

pub(super) fn validate_namespace(state: &CatalogState, namespace: &Namespace) -> Result<()> {
    require("namespace", &namespace.prefix, "id", &namespace.id)?;
    require("namespace", &namespace.prefix, "prefix", &namespace.prefix)?;
    require("namespace", &namespace.prefix, "uri", &namespace.uri)?;
    if state.namespaces.contains_key(&namespace.id)
        || state.namespaces.values().any(|n| n.prefix == namespace.prefix)
    {
        return Err(duplicate("namespace", &namespace.prefix));
    }
    if !namespace.isolated
        && state
            .namespaces
            .values()
            .any(|n| !n.isolated && n.uri == namespace.uri)
    {
        return Err(duplicate("namespace URI", &namespace.uri));
    }
    Ok(())
}

pub(super) fn validate_store(state: &CatalogState, store: &Store) -> Result<()> {
    require("store", &store.name, "id", &store.id)?;
    require("store", &store.name, "name", &store.name)?;
    let workspace = store
        .workspace
        .as_deref()
        .filter(|id| state.workspaces.contains_key(*id))
        .ok_or_else(|| unresolved("store", &store.name, "workspace"))?;
    if state.stores.contains_key(&store.id)
        || state
            .stores
            .values()
            .any(|s| s.name == store.name && s.workspace.as_deref() == Some(workspace))
    {
        return Err(duplicate("store", &store.name));
    }
    Ok(())
}

pub(super) fn validate_resource(
    state: &CatalogState,
    resource: &Resource,
    extended: bool,
) -> Result<()> {
    require("resource", &resource.name, "id", &resource.id)?;
    require("resource", &resource.name, "name", &resource.name)?;
    let workspace = resource_workspace(state, resource)
        .ok_or_else(|| unresolved("resource", &resource.name, "store"))?;
    if state.resources.contains_key(&resource.id)
        || state.resources.values().any(|r| {
            r.name == resource.name && resource_workspace(state, r) == Some(workspace)
        })
    {
        return Err(duplicate("resource", &resource.name));
    }
    if extended {
        let namespace = resource
            .namespace
            .as_deref()
            .and_then(|id| state.namespaces.get(id))
            .ok_or_else(|| unresolved("resource", &resource.name, "namespace"))?;
        let workspace_name = &state.workspaces[workspace].name;
        if &namespace.prefix != workspace_name {
            return Err(Error::Rejected {
                kind: "resource",
                name: resource.name.clone(),
                reason: format!(
                    "namespace '{}' does not match workspace '{workspace_name}'",
                    namespace.prefix
                ),
            });
        }
    }
    Ok(())
}

pub(super) fn validate_layer(state: &CatalogState, layer: &Layer, extended: bool) -> Result<()> {
    require("layer", &layer.name, "id", &layer.id)?;
    require("layer", &layer.name, "name", &layer.name)?;
    let workspace =
        layer_workspace(state, layer).ok_or_else(|| unresolved("layer", &layer.name, "resource"))?;
    if state.layers.contains_key(&layer.id)
        || state
            .layers
            .values()
            .any(|l| l.name == layer.name && layer_workspace(state, l) == Some(workspace))
    {
        return Err(duplicate("layer", &layer.name));
    }
    if let Some(style) = layer.default_style.as_deref() {
        if !state.styles.contains_key(style) {
            return Err(unresolved("layer", &layer.name, "default style"));
        }
    } else if extended {
        return Err(Error::Rejected {
            kind: "layer",
            name: layer.name.clone(),
            reason: "a default style is required".into(),
        });
    }
    Ok(())
}

pub(super) fn validate_layer_group(
    state: &CatalogState,
    group: &LayerGroup,
    extended: bool,
) -> Result<()> {
    require("layer group", &group.name, "id", &group.id)?;
    require("layer group", &group.name, "name", &group.name)?;
    check_workspace_ref(state, "layer group", &group.name, group.workspace.as_deref())?;
    if state.layer_groups.contains_key(&group.id)
        || state
            .layer_groups
            .values()
            .any(|g| g.name == group.name && g.workspace == group.workspace)
    {
        return Err(duplicate("layer group", &group.name));
    }
    if extended && group.layers.is_empty() {
        return Err(Error::Rejected {
            kind: "layer group",
            name: group.name.clone(),
            reason: "a layer group must contain at least one layer".into(),
        });
    }
    Ok(())
}

pub(super) fn validate_style(state: &CatalogState, style: &Style, extended: bool) -> Result<()> {
    require("style", &style.name, "id", &style.id)?;
    require("style", &style.name, "name", &style.name)?;
    check_workspace_ref(state, "style", &style.name, style.workspace.as_deref())?;
    if state.styles.contains_key(&style.id)
        || state
            .styles
            .values()
            .any(|s| s.name == style.name && s.workspace == style.workspace)
    {
        return Err(duplicate("style", &style.name));
    }
    if extended && style.filename.is_none() {
        return Err(Error::Rejected {
            kind: "style",
            name: style.name.clone(),
            reason: "a style file name is required".into(),
        });
    }
    Ok(())
}

use crate::catalog::Catalog;
use crate::model::Info;

fn resolved<T>(
    reference: Option<String>,
    lookup: impl Fn(&str) -> Option<T>,
    id_of: impl Fn(&T) -> String,
) -> Option<String> {
    let reference = reference?;
    let target = lookup(&reference);
    if target.is_none() {
        log::debug!("Reference '{reference}' does not resolve");
    }
    target.map(|t| id_of(&t))
}

/// Replace every reference in `info` with the id of the catalog entity it
/// names, or `None` when nothing matches. Layer group members are left as
/// written since nested groups may not be loaded yet. So are a resource's
/// store and a layer's styles: a bare name in those is only meaningful in
/// the workspace the file sits in, which the loader resolves.
///
/// The workspace of a style or layer group is the exception: an unresolved
/// one is kept as written, so the entity is never mistaken for a global one.
pub fn resolve_references(info: Info, catalog: &Catalog) -> Info {
    let workspace = |r: Option<String>| {
        resolved(r, |r| catalog.resolve_workspace(r), |w| w.id.clone())
    };
    let scope = |r: Option<String>| {
        let written = r.clone();
        workspace(r).or(written)
    };
    match info {
        Info::Store(mut store) => {
            store.workspace = workspace(store.workspace.take());
            Info::Store(store)
        }
        Info::Resource(mut resource) => {
            resource.namespace = resolved(
                resource.namespace.take(),
                |r| catalog.resolve_namespace(r),
                |n| n.id.clone(),
            );
            Info::Resource(resource)
        }
        Info::Layer(mut layer) => {
            layer.resource = resolved(
                layer.resource.take(),
                |r| catalog.resolve_resource(r),
                |r| r.id.clone(),
            );
            Info::Layer(layer)
        }
        Info::LayerGroup(mut group) => {
            group.workspace = scope(group.workspace.take());
            Info::LayerGroup(group)
        }
        Info::Style(mut style) => {
            style.workspace = scope(style.workspace.take());
            Info::Style(style)
        }
        Info::Settings(mut settings) => {
            settings.workspace = workspace(settings.workspace.take());
            Info::Settings(settings)
        }
        Info::Service(mut service) => {
            service.workspace = workspace(service.workspace.take());
            Info::Service(service)
        }
        other => other,
    }
}

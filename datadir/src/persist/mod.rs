//! The boundary between descriptor files and typed entities.
//!
//! A [`Deserializer`] turns one file into one [`Info`], resolving the
//! references it carries against the catalog being loaded. References that do
//! not resolve come back as `None`; deciding what that means is up to the
//! loaders.

mod resolve;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::model::{
    GlobalConfig, Info, InfoKind, Layer, LayerGroup, LoggingConfig, Namespace, Resource, Service,
    Settings, Store, Style, Workspace,
};
use serde::de::DeserializeOwned;
use std::path::Path;

pub use resolve::resolve_references;

/// Longest error message carried into a log line.
pub const MAX_LOGGED_MESSAGE: usize = 200;

pub trait Deserializer: Send + Sync {
    /// One-time warm-up of any shared parsing state. Called by the loader
    /// before the first file is read.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Read `path` as an entity of `kind`. Must return an error, never panic,
    /// for a malformed file.
    fn depersist(&self, path: &Path, kind: InfoKind, catalog: &Catalog) -> Result<Info>;
}

/// Reads descriptor bodies as YAML documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlDeserializer;

impl Deserializer for YamlDeserializer {
    fn depersist(&self, path: &Path, kind: InfoKind, catalog: &Catalog) -> Result<Info> {
        let parse_error = |message: String| Error::Parse {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
        let info = parse_info_str(&content, kind).map_err(|e| parse_error(e.to_string()))?;
        Ok(resolve_references(info, catalog))
    }
}

/// Parse a YAML document into the entity `kind` names.
pub fn parse_info_str(content: &str, kind: InfoKind) -> Result<Info> {
    let info = match kind {
        InfoKind::Workspace => Info::Workspace(parse_document_str::<Workspace>(content)?),
        InfoKind::Namespace => Info::Namespace(parse_document_str::<Namespace>(content)?),
        InfoKind::Store(store_kind) => {
            let mut store: Store = parse_document_str(content)?;
            store.kind = store_kind;
            Info::Store(store)
        }
        InfoKind::Resource(resource_kind) => {
            let mut resource: Resource = parse_document_str(content)?;
            resource.kind = resource_kind;
            Info::Resource(resource)
        }
        InfoKind::Layer => Info::Layer(parse_document_str::<Layer>(content)?),
        InfoKind::LayerGroup => Info::LayerGroup(parse_document_str::<LayerGroup>(content)?),
        InfoKind::Style => Info::Style(parse_document_str::<Style>(content)?),
        InfoKind::Settings => Info::Settings(parse_document_str::<Settings>(content)?),
        InfoKind::Global => Info::Global(parse_document_str::<GlobalConfig>(content)?),
        InfoKind::Logging => Info::Logging(parse_document_str::<LoggingConfig>(content)?),
        InfoKind::Service => Info::Service(parse_document_str::<Service>(content)?),
    };
    Ok(info)
}

pub fn parse_document_str<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(serde_yaml::from_str(content)?)
}

/// Cut `message` down to `max` characters for logging.
pub fn truncate_message(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceKind, StoreKind};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn catalog_with_workspace() -> Catalog {
        let catalog = Catalog::new();
        catalog
            .add_workspace_with_namespace(
                Workspace {
                    id: "ws-1".into(),
                    name: "topp".into(),
                    isolated: false,
                },
                Namespace {
                    id: "ns-1".into(),
                    prefix: "topp".into(),
                    uri: "http://topp".into(),
                    isolated: false,
                },
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_store_kind_comes_from_the_caller() {
        let info = parse_info_str(
            "id: s1\nname: roads\nworkspace: ws-1",
            InfoKind::Store(StoreKind::CoverageStore),
        )
        .unwrap();
        match info {
            Info::Store(store) => {
                assert_eq!(store.kind, StoreKind::CoverageStore);
                assert!(store.enabled);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_depersist_resolves_workspace_by_name() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datastore.xml");
        std::fs::write(&path, "id: s1\nname: roads\nworkspace: topp\n").unwrap();

        let catalog = catalog_with_workspace();
        let info = YamlDeserializer
            .depersist(&path, InfoKind::Store(StoreKind::DataStore), &catalog)
            .unwrap();
        let store = Store::try_from(info).unwrap();
        assert_eq!(store.workspace.as_deref(), Some("ws-1"));
    }

    #[test]
    fn test_depersist_clears_unresolved_reference() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("featuretype.xml");
        std::fs::write(
            &path,
            "id: r1\nname: roads\nstore: roads_shp\nnamespace: missing-ns\n",
        )
        .unwrap();

        let info = YamlDeserializer
            .depersist(
                &path,
                InfoKind::Resource(ResourceKind::FeatureType),
                &catalog_with_workspace(),
            )
            .unwrap();
        let resource = Resource::try_from(info).unwrap();
        assert_eq!(resource.namespace, None);
        assert_eq!(resource.store.as_deref(), Some("roads_shp"));
        assert_eq!(resource.kind, ResourceKind::FeatureType);
    }

    #[test]
    fn test_unresolved_style_workspace_is_kept() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("roads.xml");
        std::fs::write(&path, "id: st1\nname: roads\nworkspace: nowhere\n").unwrap();

        let info = YamlDeserializer
            .depersist(&path, InfoKind::Style, &catalog_with_workspace())
            .unwrap();
        let style = Style::try_from(info).unwrap();
        assert_eq!(style.workspace.as_deref(), Some("nowhere"));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workspace.xml");
        std::fs::write(&path, "<workspace><name>topp</name></workspace>").unwrap();

        let err = YamlDeserializer
            .depersist(&path, InfoKind::Workspace, &Catalog::new())
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(truncate_message("abcdefghij", 4), "abcd...");
        assert_eq!(truncate_message("ééééé", 2), "éé...");
    }
}

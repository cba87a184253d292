use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn enabled() -> bool {
    true
}

/// Named container of stores, styles and layer groups. Paired 1:1 with a [`Namespace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub isolated: bool,
}

/// URI-keyed counterpart of a workspace; `prefix` matches the workspace name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: String,
    pub prefix: String,
    pub uri: String,
    #[serde(default)]
    pub isolated: bool,
}

/// Store flavours, in the order their descriptor files are probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    DataStore,
    CoverageStore,
    WmsStore,
    WmtsStore,
}

impl StoreKind {
    pub const PRIORITY: [StoreKind; 4] = [
        StoreKind::DataStore,
        StoreKind::CoverageStore,
        StoreKind::WmsStore,
        StoreKind::WmtsStore,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            StoreKind::DataStore => "datastore.xml",
            StoreKind::CoverageStore => "coveragestore.xml",
            StoreKind::WmsStore => "wmsstore.xml",
            StoreKind::WmtsStore => "wmtsstore.xml",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    /// Decided by the descriptor file name, never read from the body.
    #[serde(skip)]
    pub kind: StoreKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Id of the owning workspace; `None` when the reference did not resolve.
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub connection_parameters: BTreeMap<String, String>,
    /// Capabilities URL of cascaded WMS/WMTS stores.
    #[serde(default)]
    pub url: Option<String>,
}

/// Resource flavours, in the order their descriptor files are probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    FeatureType,
    Coverage,
    WmsLayer,
    WmtsLayer,
}

impl ResourceKind {
    pub const PRIORITY: [ResourceKind; 4] = [
        ResourceKind::FeatureType,
        ResourceKind::Coverage,
        ResourceKind::WmsLayer,
        ResourceKind::WmtsLayer,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ResourceKind::FeatureType => "featuretype.xml",
            ResourceKind::Coverage => "coverage.xml",
            ResourceKind::WmsLayer => "wmslayer.xml",
            ResourceKind::WmtsLayer => "wmtslayer.xml",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub kind: ResourceKind,
    #[serde(default)]
    pub native_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Published wrapper around exactly one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub default_style: Option<String>,
    #[serde(default)]
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// `None` for global groups.
    #[serde(default)]
    pub workspace: Option<String>,
    /// Ids of member layers or nested groups, kept as written.
    #[serde(default)]
    pub layers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub id: String,
    pub name: String,
    /// `None` for global styles.
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

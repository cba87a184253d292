//! Catalog and configuration entities, plus the closed set of variants the
//! loaders move between the deserializer and the destination objects.

mod catalog;
mod config;

pub use catalog::{
    Layer, LayerGroup, Namespace, Resource, ResourceKind, Store, StoreKind, Style, Workspace,
};
pub use config::{GlobalConfig, LoggingConfig, Service, Settings};

/// What a descriptor file is expected to contain. Store and resource kinds are
/// carried along because the file name, not the content, decides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoKind {
    Workspace,
    Namespace,
    Store(StoreKind),
    Resource(ResourceKind),
    Layer,
    LayerGroup,
    Style,
    Settings,
    Global,
    Logging,
    Service,
}

impl InfoKind {
    pub fn label(self) -> &'static str {
        match self {
            InfoKind::Workspace => "workspace",
            InfoKind::Namespace => "namespace",
            InfoKind::Store(_) => "store",
            InfoKind::Resource(_) => "resource",
            InfoKind::Layer => "layer",
            InfoKind::LayerGroup => "layer group",
            InfoKind::Style => "style",
            InfoKind::Settings => "settings",
            InfoKind::Global => "global config",
            InfoKind::Logging => "logging config",
            InfoKind::Service => "service",
        }
    }
}

/// One deserialized entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Info {
    Workspace(Workspace),
    Namespace(Namespace),
    Store(Store),
    Resource(Resource),
    Layer(Layer),
    LayerGroup(LayerGroup),
    Style(Style),
    Settings(Settings),
    Global(GlobalConfig),
    Logging(LoggingConfig),
    Service(Service),
}

impl Info {
    pub fn kind(&self) -> InfoKind {
        match self {
            Info::Workspace(_) => InfoKind::Workspace,
            Info::Namespace(_) => InfoKind::Namespace,
            Info::Store(s) => InfoKind::Store(s.kind),
            Info::Resource(r) => InfoKind::Resource(r.kind),
            Info::Layer(_) => InfoKind::Layer,
            Info::LayerGroup(_) => InfoKind::LayerGroup,
            Info::Style(_) => InfoKind::Style,
            Info::Settings(_) => InfoKind::Settings,
            Info::Global(_) => InfoKind::Global,
            Info::Logging(_) => InfoKind::Logging,
            Info::Service(_) => InfoKind::Service,
        }
    }

    /// Best-effort human readable name, for log messages.
    pub fn name(&self) -> &str {
        match self {
            Info::Workspace(w) => &w.name,
            Info::Namespace(n) => &n.prefix,
            Info::Store(s) => &s.name,
            Info::Resource(r) => &r.name,
            Info::Layer(l) => &l.name,
            Info::LayerGroup(g) => &g.name,
            Info::Style(s) => &s.name,
            Info::Settings(s) => &s.id,
            Info::Global(_) => "global",
            Info::Logging(_) => "logging",
            Info::Service(s) => &s.name,
        }
    }
}

macro_rules! info_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Info {
                fn from(value: $variant) -> Self {
                    Info::$variant(value)
                }
            }

            impl TryFrom<Info> for $variant {
                type Error = Info;

                fn try_from(info: Info) -> std::result::Result<Self, Info> {
                    match info {
                        Info::$variant(value) => Ok(value),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

info_variant!(
    Workspace, Namespace, Store, Resource, Layer, LayerGroup, Style, Settings, Service,
);

impl From<GlobalConfig> for Info {
    fn from(value: GlobalConfig) -> Self {
        Info::Global(value)
    }
}

impl TryFrom<Info> for GlobalConfig {
    type Error = Info;

    fn try_from(info: Info) -> std::result::Result<Self, Info> {
        match info {
            Info::Global(value) => Ok(value),
            other => Err(other),
        }
    }
}

impl From<LoggingConfig> for Info {
    fn from(value: LoggingConfig) -> Self {
        Info::Logging(value)
    }
}

impl TryFrom<Info> for LoggingConfig {
    type Error = Info;

    fn try_from(info: Info) -> std::result::Result<Self, Info> {
        match info {
            Info::Logging(value) => Ok(value),
            other => Err(other),
        }
    }
}

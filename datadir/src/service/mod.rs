//! Per-kind service configuration loaders.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::model::{InfoKind, Service};
use crate::persist::{Deserializer, YamlDeserializer};
use std::path::Path;
use std::sync::Arc;

/// Service kinds registered by [`default_service_loaders`].
pub const DEFAULT_SERVICE_KINDS: [&str; 5] = ["wms", "wfs", "wcs", "wps", "wmts"];

/// Loads the configuration of one service kind from a directory that holds
/// its descriptor file: the data directory root for global services, a
/// workspace directory for workspace services.
pub trait ServiceLoader: Send + Sync {
    fn kind(&self) -> &str;

    /// Descriptor file name looked up in each directory.
    fn filename(&self) -> &str;

    fn load(&self, config: &ServerConfig, dir: &Path) -> Result<Service>;
}

/// Service loader for `<kind>.xml` descriptors.
pub struct YamlServiceLoader {
    kind: String,
    filename: String,
    deserializer: YamlDeserializer,
}

impl YamlServiceLoader {
    pub fn new(kind: &str) -> Self {
        YamlServiceLoader {
            kind: kind.to_string(),
            filename: format!("{kind}.xml"),
            deserializer: YamlDeserializer,
        }
    }
}

impl ServiceLoader for YamlServiceLoader {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn load(&self, config: &ServerConfig, dir: &Path) -> Result<Service> {
        let path = dir.join(&self.filename);
        let info = self
            .deserializer
            .depersist(&path, InfoKind::Service, config.catalog())?;
        let mut service = Service::try_from(info).map_err(|other| Error::UnexpectedKind {
            path: path.clone(),
            expected: InfoKind::Service.label(),
            found: other.kind().label(),
        })?;
        service.kind = self.kind.clone();
        Ok(service)
    }
}

pub fn default_service_loaders() -> Vec<Arc<dyn ServiceLoader>> {
    DEFAULT_SERVICE_KINDS
        .iter()
        .map(|kind| Arc::new(YamlServiceLoader::new(kind)) as Arc<dyn ServiceLoader>)
        .collect()
}

//! Structural discovery of a data directory.
//!
//! The walker only looks at names: which files and subdirectories exist and
//! what entity kind they stand for. It never reads a descriptor's content.
//! The workspace list is computed once and shared by the catalog and config
//! loaders until [`DataDirectoryWalker::dispose`] is called; every other
//! sequence is recomputed on each call.

use crate::error::{Error, Result};
use crate::model::{ResourceKind, StoreKind};
use std::collections::HashSet;
use std::fs::DirEntry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const WORKSPACES_DIR: &str = "workspaces";
pub const STYLES_DIR: &str = "styles";
pub const LAYERGROUPS_DIR: &str = "layergroups";

pub const WORKSPACE_FILE: &str = "workspace.xml";
pub const NAMESPACE_FILE: &str = "namespace.xml";
pub const SETTINGS_FILE: &str = "settings.xml";
pub const DEFAULT_WORKSPACE_FILE: &str = "default.xml";
pub const LAYER_FILE: &str = "layer.xml";
pub const GLOBAL_FILE: &str = "global.xml";
pub const LOGGING_FILE: &str = "logging.xml";

/// Extension of every descriptor file.
pub const DESCRIPTOR_EXTENSION: &str = "xml";

/// A `workspaces/<name>` directory holding a `workspace.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDirectory {
    pub path: PathBuf,
    pub name: String,
    pub workspace_file: PathBuf,
    pub namespace_file: Option<PathBuf>,
    pub settings_file: Option<PathBuf>,
    /// Names of the regular files directly inside the directory, so service
    /// descriptors can be matched without touching the filesystem again.
    pub file_names: HashSet<String>,
}

impl WorkspaceDirectory {
    fn scan(path: PathBuf) -> Result<Option<Self>> {
        let file_names = file_names(&path)?;
        if !file_names.contains(WORKSPACE_FILE) {
            log::debug!("{} has no {WORKSPACE_FILE}, skipping", path.display());
            return Ok(None);
        }
        let existing = |name: &str| file_names.contains(name).then(|| path.join(name));
        Ok(Some(WorkspaceDirectory {
            name: dir_name(&path),
            workspace_file: path.join(WORKSPACE_FILE),
            namespace_file: existing(NAMESPACE_FILE),
            settings_file: existing(SETTINGS_FILE),
            file_names,
            path,
        }))
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.file_names.contains(name)
    }

    /// Subdirectories holding one of the store descriptor files. `styles` and
    /// `layergroups` are never considered.
    pub fn stores(&self) -> Result<Vec<StoreDirectory>> {
        let mut stores = Vec::new();
        for dir in subdirectories(&self.path)? {
            let name = dir_name(&dir);
            if name == STYLES_DIR || name == LAYERGROUPS_DIR {
                continue;
            }
            if let Some(store) = StoreDirectory::scan(dir)? {
                stores.push(store);
            }
        }
        Ok(stores)
    }

    pub fn styles(&self) -> Result<Vec<PathBuf>> {
        descriptors(&self.path.join(STYLES_DIR))
    }

    pub fn layer_groups(&self) -> Result<Vec<PathBuf>> {
        descriptors(&self.path.join(LAYERGROUPS_DIR))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDirectory {
    pub path: PathBuf,
    pub store_file: PathBuf,
    pub kind: StoreKind,
}

impl StoreDirectory {
    fn scan(path: PathBuf) -> Result<Option<Self>> {
        let file_names = file_names(&path)?;
        let Some(kind) = first_present(&file_names, &StoreKind::PRIORITY, |k| k.file_name())
        else {
            log::debug!("{} holds no store descriptor, skipping", path.display());
            return Ok(None);
        };
        warn_if_ambiguous(&path, &file_names, &StoreKind::PRIORITY, |k| k.file_name());
        Ok(Some(StoreDirectory {
            store_file: path.join(kind.file_name()),
            kind,
            path,
        }))
    }

    /// Subdirectories holding both a `layer.xml` and a resource descriptor.
    /// Anything else is left out silently.
    pub fn layers(&self) -> Result<Vec<LayerDirectory>> {
        let mut layers = Vec::new();
        for dir in subdirectories(&self.path)? {
            if let Some(layer) = LayerDirectory::scan(dir)? {
                layers.push(layer);
            }
        }
        Ok(layers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDirectory {
    pub path: PathBuf,
    pub layer_file: PathBuf,
    pub resource_file: PathBuf,
    pub resource_kind: ResourceKind,
}

impl LayerDirectory {
    fn scan(path: PathBuf) -> Result<Option<Self>> {
        let file_names = file_names(&path)?;
        if !file_names.contains(LAYER_FILE) {
            return Ok(None);
        }
        let Some(kind) = first_present(&file_names, &ResourceKind::PRIORITY, |k| k.file_name())
        else {
            return Ok(None);
        };
        warn_if_ambiguous(&path, &file_names, &ResourceKind::PRIORITY, |k| k.file_name());
        Ok(Some(LayerDirectory {
            layer_file: path.join(LAYER_FILE),
            resource_file: path.join(kind.file_name()),
            resource_kind: kind,
            path,
        }))
    }
}

pub struct DataDirectoryWalker {
    root: PathBuf,
    workspaces: Mutex<Option<Arc<[WorkspaceDirectory]>>>,
}

impl DataDirectoryWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataDirectoryWalker {
            root: root.into(),
            workspaces: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn global_styles(&self) -> Result<Vec<PathBuf>> {
        descriptors(&self.root.join(STYLES_DIR))
    }

    pub fn global_layer_groups(&self) -> Result<Vec<PathBuf>> {
        descriptors(&self.root.join(LAYERGROUPS_DIR))
    }

    /// `workspaces/default.xml`, when present.
    pub fn default_workspace(&self) -> Option<PathBuf> {
        let path = self.root.join(WORKSPACES_DIR).join(DEFAULT_WORKSPACE_FILE);
        path.is_file().then_some(path)
    }

    /// Names of the regular files directly under the root.
    pub fn root_files(&self) -> Result<HashSet<String>> {
        file_names(&self.root)
    }

    /// Workspace directories, sorted by name. Computed on first use and
    /// cached until [`dispose`](Self::dispose).
    pub fn workspaces(&self) -> Result<Arc<[WorkspaceDirectory]>> {
        let mut cached = self
            .workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(workspaces) = cached.as_ref() {
            return Ok(Arc::clone(workspaces));
        }
        let mut workspaces = Vec::new();
        for dir in subdirectories(&self.root.join(WORKSPACES_DIR))? {
            if let Some(workspace) = WorkspaceDirectory::scan(dir)? {
                workspaces.push(workspace);
            }
        }
        let workspaces: Arc<[WorkspaceDirectory]> = workspaces.into();
        log::debug!(
            "Found {} workspace directories under {}",
            workspaces.len(),
            self.root.display()
        );
        *cached = Some(Arc::clone(&workspaces));
        Ok(workspaces)
    }

    /// Drop the cached workspace list.
    pub fn dispose(&self) {
        self.workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cached(&self) -> bool {
        self.workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Entries of `dir`, or nothing when it does not exist. Any other error is fatal.
fn entries(dir: &Path) -> Result<Vec<DirEntry>> {
    let walk_error = |source| Error::Walk {
        path: dir.to_path_buf(),
        source,
    };
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(walk_error(e)),
    };
    read.collect::<std::io::Result<Vec<_>>>().map_err(walk_error)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = entries(dir)?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn file_names(dir: &Path) -> Result<HashSet<String>> {
    Ok(entries(dir)?
        .into_iter()
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect())
}

/// `*.xml` files directly inside `dir`, sorted.
fn descriptors(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = format!(
        "{}/*.{DESCRIPTOR_EXTENSION}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|e| Error::Walk {
            path: e.path().to_path_buf(),
            source: e.into_error(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn first_present<K: Copy>(
    file_names: &HashSet<String>,
    priority: &[K],
    file_name: impl Fn(K) -> &'static str,
) -> Option<K> {
    priority
        .iter()
        .copied()
        .find(|k| file_names.contains(file_name(*k)))
}

fn warn_if_ambiguous<K: Copy>(
    path: &Path,
    file_names: &HashSet<String>,
    priority: &[K],
    file_name: impl Fn(K) -> &'static str,
) {
    let present: Vec<&str> = priority
        .iter()
        .map(|k| file_name(*k))
        .filter(|name| file_names.contains(*name))
        .collect();
    if present.len() > 1 {
        log::warn!(
            "{} holds several descriptors ({}), using {}",
            path.display(),
            present.join(", "),
            present[0]
        );
    }
}

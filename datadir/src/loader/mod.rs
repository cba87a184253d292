//! Orchestrates the two top-level loads, catalog then configuration, over
//! one bounded worker pool.
//!
//! A [`DataDirectoryLoader`] is single use: each load may run once, and once
//! both have completed (or either has failed) the pool and the walker cache
//! are released. Later calls fail with [`Error::Disposed`].

mod catalog;
mod config;
mod options;
mod pool;

pub use catalog::{CatalogLoader, DEFAULT_STYLES};
pub use config::ConfigLoader;
pub use options::{
    default_parallelism, parse_parallelism, resolve_parallelism, InvalidParallelism,
    LoaderOptions, MAX_DEFAULT_PARALLELISM, PARALLELISM_ENV,
};
pub use pool::LoaderPool;

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::persist::{Deserializer, YamlDeserializer};
use crate::service::{default_service_loaders, ServiceLoader};
use crate::walker::DataDirectoryWalker;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    InFlight { catalog: Phase, config: Phase },
    /// Both loads completed; resources released.
    BothDone,
    /// A load failed; resources released.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Catalog,
    Config,
}

impl Operation {
    fn label(self) -> &'static str {
        match self {
            Operation::Catalog => "catalog",
            Operation::Config => "configuration",
        }
    }
}

pub struct DataDirectoryLoader {
    walker: Arc<DataDirectoryWalker>,
    deserializer: Arc<dyn Deserializer>,
    service_loaders: Vec<Arc<dyn ServiceLoader>>,
    pool: Mutex<Option<Arc<LoaderPool>>>,
    state: Mutex<LoaderState>,
}

impl DataDirectoryLoader {
    /// Loader over `root` with the YAML deserializer and the default service
    /// loaders.
    pub fn new(root: impl Into<PathBuf>, options: &LoaderOptions) -> Result<Self> {
        Self::with_collaborators(
            root,
            options,
            Arc::new(YamlDeserializer),
            default_service_loaders(),
        )
    }

    pub fn with_collaborators(
        root: impl Into<PathBuf>,
        options: &LoaderOptions,
        deserializer: Arc<dyn Deserializer>,
        service_loaders: Vec<Arc<dyn ServiceLoader>>,
    ) -> Result<Self> {
        deserializer.initialize()?;
        let pool = LoaderPool::new(options.parallelism())?;
        let walker = DataDirectoryWalker::new(root);
        log::info!(
            "Loading data directory {} with {} workers",
            walker.root().display(),
            pool.size()
        );
        Ok(DataDirectoryLoader {
            walker: Arc::new(walker),
            deserializer,
            service_loaders,
            pool: Mutex::new(Some(Arc::new(pool))),
            state: Mutex::new(LoaderState::Idle),
        })
    }

    pub fn state(&self) -> LoaderState {
        *self.lock_state()
    }

    /// Worker count of the pool, or `None` once disposed.
    pub fn parallelism(&self) -> Option<usize> {
        self.lock_pool().as_ref().map(|pool| pool.size())
    }

    /// Populate `catalog` from the data directory and hand it back shared.
    pub fn load_catalog(&self, catalog: Catalog) -> Result<Arc<Catalog>> {
        let pool = self.begin(Operation::Catalog)?;
        let result = pool.run(|| {
            CatalogLoader::new(&self.walker, self.deserializer.as_ref(), &catalog).load()
        });
        self.finish(Operation::Catalog, result.is_ok());
        result.map(|()| Arc::new(catalog))
    }

    /// Build the server configuration for an already loaded `catalog`.
    /// Global and logging fall back to defaults when the files are absent.
    pub fn load_config(&self, catalog: Arc<Catalog>) -> Result<ServerConfig> {
        let pool = self.begin(Operation::Config)?;
        let config = ServerConfig::new(catalog);
        let result = pool.run(|| {
            ConfigLoader::new(
                &self.walker,
                self.deserializer.as_ref(),
                &self.service_loaders,
                &config,
            )
            .load()
        });
        self.finish(Operation::Config, result.is_ok());
        result?;
        config.ensure_defaults();
        Ok(config)
    }

    fn begin(&self, op: Operation) -> Result<Arc<LoaderPool>> {
        let mut state = self.lock_state();
        let (mut catalog, mut config) = match *state {
            LoaderState::Idle => (Phase::Pending, Phase::Pending),
            LoaderState::InFlight { catalog, config } => (catalog, config),
            LoaderState::BothDone | LoaderState::Failed => return Err(Error::Disposed),
        };
        let phase = match op {
            Operation::Catalog => &mut catalog,
            Operation::Config => &mut config,
        };
        if *phase != Phase::Pending {
            return Err(Error::AlreadyLoaded(op.label()));
        }
        *phase = Phase::Running;
        let pool = self.lock_pool().clone().ok_or(Error::Disposed)?;
        *state = LoaderState::InFlight { catalog, config };
        Ok(pool)
    }

    fn finish(&self, op: Operation, ok: bool) {
        let mut state = self.lock_state();
        let LoaderState::InFlight {
            mut catalog,
            mut config,
        } = *state
        else {
            return;
        };
        if !ok {
            log::error!("Loading the {} failed, releasing the loader", op.label());
            *state = LoaderState::Failed;
            self.dispose();
            return;
        }
        match op {
            Operation::Catalog => catalog = Phase::Done,
            Operation::Config => config = Phase::Done,
        }
        if catalog == Phase::Done && config == Phase::Done {
            *state = LoaderState::BothDone;
            self.dispose();
        } else {
            *state = LoaderState::InFlight { catalog, config };
        }
    }

    fn dispose(&self) {
        self.lock_pool().take();
        self.walker.dispose();
        log::debug!("Released loader for {}", self.walker.root().display());
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pool(&self) -> MutexGuard<'_, Option<Arc<LoaderPool>>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogCounts;
    use crate::model::{Info, InfoKind};
    use crate::testing::DataDir;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn options(parallelism: &str) -> LoaderOptions {
        LoaderOptions::default().with_parallelism(parallelism)
    }

    fn load(dir: &DataDir) -> (Arc<Catalog>, ServerConfig) {
        let loader = DataDirectoryLoader::new(dir.root(), &options("4")).unwrap();
        let catalog = loader.load_catalog(Catalog::new()).unwrap();
        let config = loader.load_config(Arc::clone(&catalog)).unwrap();
        (catalog, config)
    }

    fn minimal() -> DataDir {
        let dir = DataDir::new();
        dir.workspace("topp");
        dir.store("topp", "states_shp", &["states"]);
        dir.service(None, "wms");
        dir
    }

    #[derive(Default)]
    struct CountingDeserializer {
        inner: YamlDeserializer,
        initialized: AtomicUsize,
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl Deserializer for CountingDeserializer {
        fn initialize(&self) -> Result<()> {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn depersist(&self, path: &Path, kind: InfoKind, catalog: &Catalog) -> Result<Info> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            let result = self.inner.depersist(path, kind, catalog);
            self.current.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    struct PanickingDeserializer;

    impl Deserializer for PanickingDeserializer {
        fn depersist(&self, path: &Path, _: InfoKind, _: &Catalog) -> Result<Info> {
            panic!("cannot read {}", path.display());
        }
    }

    #[test]
    fn test_minimal_tree() {
        let dir = minimal();
        let (catalog, config) = load(&dir);

        assert_eq!(
            catalog.counts(),
            CatalogCounts {
                workspaces: 1,
                namespaces: 1,
                stores: 1,
                resources: 1,
                layers: 1,
                layer_groups: 0,
                styles: DEFAULT_STYLES.len(),
            }
        );
        let layer = catalog.layer_by_name("topp:states").unwrap();
        assert_eq!(layer.resource.as_deref(), Some("ft-topp-states"));
        assert_eq!(layer.default_style.as_deref(), Some("style-default-generic"));
        assert_eq!(catalog.default_workspace().unwrap().name, "topp");
        assert_eq!(catalog.default_namespace().unwrap().prefix, "topp");
        assert!(!catalog.is_extended_validation());

        assert_eq!(config.counts().global_services, 1);
        assert_eq!(config.service("wms", None).unwrap().kind, "wms");
        assert!(config.global().is_some());
        assert!(config.logging().is_some());
    }

    #[test]
    fn test_corrupt_namespace_drops_the_workspace_subtree() {
        let dir = minimal();
        dir.write("workspaces/topp/namespace.xml", "id: [unclosed\n");
        let (catalog, _) = load(&dir);

        let counts = catalog.counts();
        assert_eq!(counts.workspaces, 0);
        assert_eq!(counts.namespaces, 0);
        assert_eq!(counts.stores, 0);
        assert_eq!(counts.resources, 0);
        assert_eq!(counts.layers, 0);
        assert!(catalog.default_workspace().is_none());
    }

    #[test]
    fn test_missing_namespace_skips_the_workspace() {
        let dir = minimal();
        dir.workspace("sf");
        std::fs::remove_file(dir.root().join("workspaces/topp/namespace.xml")).unwrap();
        let (catalog, _) = load(&dir);

        assert!(catalog.workspace_by_name("topp").is_none());
        assert!(catalog.workspace_by_name("sf").is_some());
        assert_eq!(catalog.counts().stores, 0);
    }

    #[test]
    fn test_resource_with_unresolved_store_is_skipped() {
        let dir = minimal();
        dir.write(
            "workspaces/topp/states_shp/states/featuretype.xml",
            "id: ft-topp-states\nname: states\nstore: nowhere\n",
        );
        let (catalog, _) = load(&dir);

        let counts = catalog.counts();
        assert_eq!(counts.stores, 1);
        assert_eq!(counts.resources, 0);
        assert_eq!(counts.layers, 0);
    }

    #[test]
    fn test_same_named_stores_bind_to_their_own_workspace() {
        let dir = DataDir::new();
        for ws in ["alpha", "beta"] {
            dir.workspace(ws);
            dir.store(ws, "states", &["roads"]);
            dir.write(
                &format!("workspaces/{ws}/states/roads/featuretype.xml"),
                &format!("id: ft-{ws}-roads\nname: roads\nstore: states\nnamespace: {ws}\n"),
            );
        }

        for _ in 0..10 {
            let (catalog, _) = load(&dir);
            assert_eq!(catalog.counts().resources, 2);
            assert_eq!(catalog.counts().layers, 2);
            for ws in ["alpha", "beta"] {
                let resource = catalog.resource(&format!("ft-{ws}-roads")).unwrap();
                assert_eq!(resource.store, Some(format!("store-{ws}-states")));
            }
        }
    }

    #[test]
    fn test_resource_naming_another_store_is_skipped() {
        let dir = minimal();
        dir.workspace("sf");
        dir.store("sf", "roads_shp", &[]);
        dir.write(
            "workspaces/topp/states_shp/states/featuretype.xml",
            "id: ft-topp-states\nname: states\nstore: store-sf-roads_shp\n",
        );
        let (catalog, _) = load(&dir);

        assert_eq!(catalog.counts().stores, 2);
        assert_eq!(catalog.counts().resources, 0);
        assert_eq!(catalog.counts().layers, 0);
    }

    #[test]
    fn test_layer_with_unresolved_resource_is_skipped() {
        let dir = minimal();
        dir.write(
            "workspaces/topp/states_shp/states/layer.xml",
            "id: layer-topp-states\nname: states\nresource: ft-missing\ndefault_style: generic\n",
        );
        let (catalog, _) = load(&dir);

        assert_eq!(catalog.counts().resources, 1);
        assert_eq!(catalog.counts().layers, 0);
    }

    #[test]
    fn test_failed_store_skips_its_layers() {
        let dir = minimal();
        dir.write("workspaces/topp/states_shp/datastore.xml", "name: [\n");
        let (catalog, _) = load(&dir);

        assert_eq!(catalog.counts().workspaces, 1);
        assert_eq!(catalog.counts().stores, 0);
        assert_eq!(catalog.counts().layers, 0);
    }

    #[test]
    fn test_loads_are_repeatable() {
        let dir = DataDir::new();
        for ws in ["alpha", "beta", "gamma"] {
            dir.workspace(ws);
            dir.store(ws, "one", &["a", "b"]);
            dir.store(ws, "two", &["c"]);
            dir.workspace_style(ws, "roads");
        }
        let (first, _) = load(&dir);
        let (second, _) = load(&dir);

        assert_eq!(first.counts(), second.counts());
        let ids = |c: &Arc<Catalog>| {
            let mut ids: Vec<String> = c.layers().iter().map(|l| l.id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.counts().layers, 9);
    }

    #[test]
    fn test_parallelism_is_bounded() {
        let dir = DataDir::new();
        for w in 0..4 {
            let ws = format!("ws{w}");
            dir.workspace(&ws);
            for s in 0..2 {
                let layers: Vec<String> = (0..3).map(|l| format!("s{s}l{l}")).collect();
                let layers: Vec<&str> = layers.iter().map(String::as_str).collect();
                dir.store(&ws, &format!("store{s}"), &layers);
            }
        }
        let counting = Arc::new(CountingDeserializer::default());
        let loader = DataDirectoryLoader::with_collaborators(
            dir.root(),
            &options("2"),
            counting.clone(),
            default_service_loaders(),
        )
        .unwrap();
        let catalog = loader.load_catalog(Catalog::new()).unwrap();
        loader.load_config(Arc::clone(&catalog)).unwrap();

        assert_eq!(catalog.counts().layers, 24);
        assert_eq!(counting.initialized.load(Ordering::SeqCst), 1);
        let max = counting.max.load(Ordering::SeqCst);
        assert!((1..=2).contains(&max), "observed {max} concurrent parses");
    }

    #[test]
    fn test_workspace_service_without_workspace_is_excluded() {
        let dir = minimal();
        dir.write("workspaces/topp/settings.xml", "id: settings-topp\nworkspace: topp\n");
        dir.service(Some("topp"), "wms");
        dir.write("workspaces/topp/wfs.xml", "id: wfs-topp\nname: WFS\n");
        let (_, config) = load(&dir);

        assert_eq!(config.counts().settings, 1);
        assert_eq!(config.counts().workspace_services, 1);
        assert!(config.service("wms", Some("ws-topp")).is_some());
        assert!(config.service("wfs", Some("ws-topp")).is_none());
        assert!(config.service_by_id("wfs-topp").is_none());
    }

    #[test]
    fn test_settings_of_another_workspace_are_ignored() {
        let dir = minimal();
        dir.workspace("sf");
        dir.write("workspaces/topp/settings.xml", "id: settings-topp\nworkspace: sf\n");
        let (_, config) = load(&dir);

        assert_eq!(config.counts().settings, 0);
    }

    #[test]
    fn test_global_and_logging_files() {
        let dir = minimal();
        dir.write("global.xml", "update_sequence: 42\nadmin_username: admin\n");
        dir.write("logging.xml", "level: VERBOSE_LOGGING\nlocation: logs/verbose.log\n");
        let (_, config) = load(&dir);

        assert_eq!(config.global().unwrap().update_sequence, 42);
        assert_eq!(config.logging().unwrap().level, "VERBOSE_LOGGING");
    }

    #[test]
    fn test_workspace_directory_name_may_differ_from_workspace_name() {
        let dir = DataDir::new();
        dir.write("workspaces/topp_dir/workspace.xml", "id: ws-topp\nname: topp\n");
        dir.write(
            "workspaces/topp_dir/namespace.xml",
            "id: ns-topp\nprefix: topp\nuri: http://topp.example.com\n",
        );
        dir.write("workspaces/topp_dir/settings.xml", "id: settings-topp\nworkspace: topp\n");
        dir.write("workspaces/topp_dir/wms.xml", "id: wms-topp\nname: WMS\nworkspace: topp\n");
        let (catalog, config) = load(&dir);

        assert_eq!(catalog.counts().workspaces, 1);
        assert_eq!(config.counts().settings, 1);
        assert_eq!(config.counts().workspace_services, 1);
        assert!(config.settings("ws-topp").is_some());
        assert!(config.service("wms", Some("ws-topp")).is_some());
    }

    #[test]
    fn test_invalid_override_falls_back_to_default() {
        let dir = DataDir::new();
        let loader = DataDirectoryLoader::new(dir.root(), &options("zero")).unwrap();
        assert_eq!(loader.parallelism(), Some(default_parallelism()));

        let loader = DataDirectoryLoader::new(dir.root(), &options("3")).unwrap();
        assert_eq!(loader.parallelism(), Some(3));
    }

    #[test]
    fn test_loader_is_single_use() {
        let dir = minimal();
        let loader = DataDirectoryLoader::new(dir.root(), &options("2")).unwrap();
        assert_eq!(loader.state(), LoaderState::Idle);

        let catalog = loader.load_catalog(Catalog::new()).unwrap();
        assert_eq!(
            loader.state(),
            LoaderState::InFlight {
                catalog: Phase::Done,
                config: Phase::Pending,
            }
        );
        assert!(matches!(
            loader.load_catalog(Catalog::new()),
            Err(Error::AlreadyLoaded(_))
        ));

        loader.load_config(catalog).unwrap();
        assert_eq!(loader.state(), LoaderState::BothDone);
        assert_eq!(loader.parallelism(), None);
        assert!(matches!(
            loader.load_catalog(Catalog::new()),
            Err(Error::Disposed)
        ));
    }

    #[test]
    fn test_worker_panic_fails_the_loader() {
        let dir = minimal();
        dir.global_style("roads");
        let loader = DataDirectoryLoader::with_collaborators(
            dir.root(),
            &options("2"),
            Arc::new(PanickingDeserializer),
            default_service_loaders(),
        )
        .unwrap();

        let Err(err) = loader.load_catalog(Catalog::new()) else {
            panic!("load should fail");
        };
        assert!(matches!(err, Error::WorkerPanic { .. }));
        assert!(err.is_fatal());
        assert_eq!(loader.state(), LoaderState::Failed);
        assert!(matches!(
            loader.load_config(Arc::new(Catalog::new())),
            Err(Error::Disposed)
        ));
    }

    #[test]
    fn test_default_workspace_file() {
        let dir = DataDir::new();
        dir.workspace("alpha");
        dir.workspace("beta");
        let (catalog, _) = load(&dir);
        assert_eq!(catalog.default_workspace().unwrap().name, "alpha");

        dir.write("workspaces/default.xml", "id: ws-beta\nname: beta\n");
        let (catalog, _) = load(&dir);
        assert_eq!(catalog.default_workspace().unwrap().name, "beta");
        assert_eq!(catalog.default_namespace().unwrap().prefix, "beta");
    }

    #[test]
    fn test_data_directory_styles_replace_defaults() {
        let dir = minimal();
        dir.global_style("point");
        let (catalog, _) = load(&dir);

        assert_eq!(catalog.counts().styles, DEFAULT_STYLES.len());
        assert_eq!(catalog.style_by_name(None, "point").unwrap().id, "style-point");
        assert_eq!(
            catalog.style_by_name(None, "raster").unwrap().filename.as_deref(),
            Some("default_raster.sld")
        );
    }

    #[test]
    fn test_styles_must_match_their_scope() {
        let dir = minimal();
        dir.workspace("sf");
        dir.write(
            "styles/scoped.xml",
            "id: style-scoped\nname: scoped\nworkspace: topp\n",
        );
        dir.write(
            "workspaces/topp/styles/stray.xml",
            "id: style-stray\nname: stray\nworkspace: sf\n",
        );
        dir.workspace_style("topp", "roads");
        let (catalog, _) = load(&dir);

        assert!(catalog.style("style-scoped").is_none());
        assert!(catalog.style("style-stray").is_none());
        assert!(catalog.style_by_name(Some("ws-topp"), "roads").is_some());
    }

    #[test]
    fn test_layer_styles_fall_back_to_defaults() {
        let dir = minimal();
        dir.workspace("sf");
        dir.workspace_style("sf", "roads");
        dir.write(
            "workspaces/topp/states_shp/states/layer.xml",
            "id: layer-topp-states\nname: states\nresource: ft-topp-states\ndefault_style: style-sf-roads\n",
        );
        dir.write("workspaces/topp/dem/coveragestore.xml", "id: cs-dem\nname: dem\nworkspace: topp\n");
        dir.write(
            "workspaces/topp/dem/dem/coverage.xml",
            "id: cov-dem\nname: dem\nstore: cs-dem\nnamespace: topp\n",
        );
        dir.write("workspaces/topp/dem/dem/layer.xml", "id: layer-dem\nname: dem\nresource: cov-dem\n");
        let (catalog, _) = load(&dir);

        let states = catalog.layer("layer-topp-states").unwrap();
        assert_eq!(states.default_style.as_deref(), Some("style-default-generic"));
        let dem = catalog.layer("layer-dem").unwrap();
        assert_eq!(dem.default_style.as_deref(), Some("style-default-raster"));
    }

    #[test]
    fn test_layer_style_names_resolve_in_the_layer_workspace() {
        let dir = minimal();
        dir.workspace("sf");
        dir.global_style("roads");
        dir.workspace_style("topp", "roads");
        dir.workspace_style("sf", "roads");
        dir.write(
            "workspaces/topp/states_shp/states/layer.xml",
            "id: layer-topp-states\nname: states\nresource: ft-topp-states\n\
             default_style: roads\nstyles: [roads, point, missing, style-sf-roads]\n",
        );
        let (catalog, _) = load(&dir);

        let layer = catalog.layer("layer-topp-states").unwrap();
        assert_eq!(layer.default_style.as_deref(), Some("style-topp-roads"));
        assert_eq!(
            layer.styles,
            vec![
                "style-topp-roads".to_string(),
                "style-default-point".to_string(),
                "style-default-generic".to_string(),
            ]
        );
    }

    #[test]
    fn test_layer_groups_must_match_their_scope() {
        let dir = minimal();
        dir.write("layergroups/base.xml", "id: lg-base\nname: base\n");
        dir.write("layergroups/bad.xml", "id: lg-bad\nname: bad\nworkspace: topp\n");
        dir.write(
            "workspaces/topp/layergroups/all.xml",
            "id: lg-topp\nname: all\nworkspace: topp\nlayers: [layer-topp-states]\n",
        );
        let (catalog, _) = load(&dir);

        assert!(catalog.layer_group("lg-base").is_some());
        assert!(catalog.layer_group("lg-bad").is_none());
        let group = catalog.layer_group("lg-topp").unwrap();
        assert_eq!(group.workspace.as_deref(), Some("ws-topp"));
        assert_eq!(group.layers, vec!["layer-topp-states".to_string()]);
    }
}

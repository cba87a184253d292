//! Builders for throwaway data directories used across the unit tests.

use std::path::Path;
use tempfile::TempDir;

pub struct DataDir {
    tmp: TempDir,
}

impl DataDir {
    pub fn new() -> Self {
        DataDir {
            tmp: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// `workspaces/<name>` with matching workspace and namespace descriptors.
    pub fn workspace(&self, name: &str) {
        self.write(
            &format!("workspaces/{name}/workspace.xml"),
            &format!("id: ws-{name}\nname: {name}\n"),
        );
        self.write(
            &format!("workspaces/{name}/namespace.xml"),
            &format!("id: ns-{name}\nprefix: {name}\nuri: http://{name}.example.com\n"),
        );
    }

    /// A data store with one feature type layer per entry of `layers`.
    pub fn store(&self, workspace: &str, store: &str, layers: &[&str]) {
        let base = format!("workspaces/{workspace}/{store}");
        self.write(
            &format!("{base}/datastore.xml"),
            &format!("id: store-{workspace}-{store}\nname: {store}\nworkspace: ws-{workspace}\n"),
        );
        for layer in layers {
            self.layer(&base, workspace, store, layer);
        }
    }

    fn layer(&self, base: &str, workspace: &str, store: &str, layer: &str) {
        self.write(
            &format!("{base}/{layer}/featuretype.xml"),
            &format!(
                "id: ft-{workspace}-{layer}\nname: {layer}\nstore: store-{workspace}-{store}\nnamespace: ns-{workspace}\n"
            ),
        );
        self.write(
            &format!("{base}/{layer}/layer.xml"),
            &format!(
                "id: layer-{workspace}-{layer}\nname: {layer}\nresource: ft-{workspace}-{layer}\ndefault_style: generic\n"
            ),
        );
    }

    pub fn global_style(&self, name: &str) {
        self.write(
            &format!("styles/{name}.xml"),
            &format!("id: style-{name}\nname: {name}\nfilename: {name}.sld\n"),
        );
    }

    pub fn workspace_style(&self, workspace: &str, name: &str) {
        self.write(
            &format!("workspaces/{workspace}/styles/{name}.xml"),
            &format!(
                "id: style-{workspace}-{name}\nname: {name}\nworkspace: ws-{workspace}\nfilename: {name}.sld\n"
            ),
        );
    }

    pub fn service(&self, workspace: Option<&str>, kind: &str) {
        match workspace {
            Some(ws) => self.write(
                &format!("workspaces/{ws}/{kind}.xml"),
                &format!("id: {kind}-{ws}\nname: {}\nworkspace: ws-{ws}\n", kind.to_uppercase()),
            ),
            None => self.write(
                &format!("{kind}.xml"),
                &format!("id: {kind}-global\nname: {}\n", kind.to_uppercase()),
            ),
        }
    }
}

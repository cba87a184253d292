use serde::{Deserialize, Serialize};

fn enabled() -> bool {
    true
}

fn default_charset() -> String {
    "UTF-8".into()
}

fn default_num_decimals() -> u32 {
    8
}

/// Server settings. The global instance lives inside [`GlobalConfig`]; the
/// per-workspace overrides carry their workspace id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub id: String,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default = "default_num_decimals")]
    pub num_decimals: u32,
    #[serde(default)]
    pub proxy_base_url: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub verbose_exceptions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            id: "settings".into(),
            workspace: None,
            title: None,
            charset: default_charset(),
            num_decimals: default_num_decimals(),
            proxy_base_url: None,
            verbose: false,
            verbose_exceptions: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub update_sequence: u64,
    #[serde(default)]
    pub feature_type_cache_size: u32,
    #[serde(default = "enabled")]
    pub global_services: bool,
    #[serde(default)]
    pub admin_username: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            settings: Settings::default(),
            update_sequence: 0,
            feature_type_cache_size: 0,
            global_services: true,
            admin_username: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub location: String,
    #[serde(default)]
    pub std_out_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "DEFAULT_LOGGING".into(),
            location: "logs/server.log".into(),
            std_out_logging: false,
        }
    }
}

/// Configuration of one protocol endpoint, global or scoped to a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Set by the service loader that produced it (`wms`, `wfs`, ...).
    #[serde(skip)]
    pub kind: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
}

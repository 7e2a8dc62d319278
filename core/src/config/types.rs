use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Root of everything chainkit writes: resource records, plugin data,
    /// logs. Filled in by `load_default` when unset.
    #[serde(default)]
    pub data_dir: Option<String>,
}

impl AppConfig {
    pub fn data_dir(&self) -> Option<std::path::PathBuf> {
        self.data_dir
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(std::path::PathBuf::from)
    }

    pub fn state_file(&self) -> Option<std::path::PathBuf> {
        self.data_dir().map(|dir| dir.join("resources.json"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "warn" or "chainkit_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Hide the subtasks of finished tasks that ask to be collapsed.
    #[serde(default = "default_collapse_subtasks")]
    pub collapse_subtasks: bool,

    /// Spinner tick while a task stream is live.
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
}

fn default_collapse_subtasks() -> bool {
    true
}

fn default_render_interval_ms() -> u64 {
    80
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            collapse_subtasks: default_collapse_subtasks(),
            render_interval_ms: default_render_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default = "default_enabled_plugins")]
    pub enabled: Vec<String>,
}

fn default_enabled_plugins() -> Vec<String> {
    vec!["devnet".to_string(), "wallet".to_string()]
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_plugins(),
        }
    }
}

impl PluginsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|p| p == name)
    }
}

use thiserror::Error;

/// Failures of the resource-management surface itself. Failures inside a
/// running task list never show up here; they are recorded on the task.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("plugin already registered: {0}")]
    DuplicatePlugin(String),

    #[error("plugin '{plugin}' has no resource type '{kind}'")]
    KindNotFound { plugin: String, kind: String },

    #[error("resource type '{0}' is provided by more than one plugin: {1}")]
    AmbiguousKind(String, String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} '{name}' is required by: {dependents}")]
    HasDependents {
        kind: String,
        name: String,
        dependents: String,
    },

    #[error("a resource name is required for {0}")]
    MissingName(&'static str),

    #[error("plugin '{plugin}' does not handle '{method}'")]
    UnknownMethod { plugin: String, method: String },

    #[error("adapter error: {0}")]
    Adapter(#[from] anyhow::Error),
}

impl ResourceError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

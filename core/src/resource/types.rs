use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::adapter::ResourceAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Started,
    #[default]
    Stopped,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("started"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// What every plugin knows about one of its resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResource {
    pub plugin: String,
    pub resource_type: String,
    /// Fully qualified name, unique per plugin and kind.
    pub name: String,
    /// Name as the user typed it.
    pub base_name: String,
    pub state: ResourceState,
}

impl BaseResource {
    pub fn new(plugin: &str, resource_type: &str, name: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            base_name: name.to_string(),
            state: ResourceState::Stopped,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.plugin, &self.resource_type, &self.name)
    }

    pub fn is_started(&self) -> bool {
        self.state == ResourceState::Started
    }
}

/// `plugin/kind/name`, the identity of a resource across plugins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub plugin: String,
    pub kind: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(plugin: &str, kind: &str, name: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.plugin, self.kind, self.name)
    }
}

/// Parameters of a create call, handed to the kind's master adapter and to
/// every plugin's create hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateRequest {
    pub plugin: String,
    pub kind: String,
    pub name: String,
    /// Extra positional arguments after the name.
    pub args: Vec<String>,
    pub options: serde_json::Value,
}

impl CreateRequest {
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Shared context of every task list run on behalf of a resource.
///
/// - `request`: seeded by the manager before the run.
/// - `adapter`, `resource`: written by a create list, read by the manager's
///   registration task.
/// - `dependencies`: appended by create hooks that tie the new resource to
///   existing ones.
/// - `notes`: free-form lines a task wants reported at the end.
#[derive(Clone, Default)]
pub struct ResourceContext {
    pub request: CreateRequest,
    pub resource: Option<BaseResource>,
    pub adapter: Option<Arc<dyn ResourceAdapter>>,
    pub dependencies: Vec<ResourceKey>,
    pub notes: Vec<String>,
}

impl fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContext")
            .field("request", &self.request)
            .field("resource", &self.resource)
            .field("adapter", &self.adapter.as_ref().map(|a| a.resource().name))
            .field("dependencies", &self.dependencies)
            .field("notes", &self.notes)
            .finish()
    }
}

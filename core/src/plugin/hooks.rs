use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crud::CrudVerb;
use crate::manager::ResourceManagement;
use crate::resource::{CreateRequest, ResourceContext};
use crate::task::TaskList;

/// Lets one plugin observe or extend another plugin's create list, e.g. to
/// register a dependency on the new resource.
pub trait CreateHook: Send + Sync {
    fn name(&self) -> &str;

    fn applies_to(&self, request: &CreateRequest) -> bool;

    /// Return the list that should run instead of `list`. Typically `list`
    /// nested as the first task of a bigger list.
    fn augment(
        &self,
        request: &CreateRequest,
        list: TaskList<ResourceContext>,
    ) -> TaskList<ResourceContext>;
}

/// One CLI command as seen by command hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub command: String,
    pub verb: Option<CrudVerb>,
    pub plugin: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub options: serde_json::Value,
}

impl CommandInvocation {
    pub fn crud(verb: CrudVerb, plugin: &str, kind: &str, name: Option<&str>) -> Self {
        Self {
            command: verb.to_string(),
            verb: Some(verb),
            plugin: Some(plugin.to_string()),
            kind: Some(kind.to_string()),
            name: name.map(str::to_string),
            options: serde_json::Value::Null,
        }
    }

    pub fn is(&self, verb: CrudVerb, kind: &str) -> bool {
        self.verb == Some(verb) && self.kind.as_deref() == Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Runs around arbitrary commands, e.g. to select a freshly created wallet.
/// A failing `pre` hook aborts the command; a failing `post` hook is logged.
#[async_trait]
pub trait CommandHook: Send + Sync {
    fn name(&self) -> &str;

    async fn pre(
        &self,
        _invocation: &CommandInvocation,
        _api: &dyn ResourceManagement,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn post(
        &self,
        _invocation: &CommandInvocation,
        _result: &CommandResult,
        _api: &dyn ResourceManagement,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

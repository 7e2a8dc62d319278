//! Plugins: loadable bundles of resource kinds plus cross-plugin hooks.

mod hooks;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ResourceError;
use crate::manager::ResourceRequest;
use crate::resource::{ResourceContext, ResourceNames, ResourceType};
use crate::task::TaskList;

pub use hooks::{CommandHook, CommandInvocation, CommandResult, CreateHook};

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable identifier, used in requests and persisted resource records.
    fn name(&self) -> &str;

    fn names(&self) -> ResourceNames {
        ResourceNames::new(self.name())
    }

    fn resource_types(&self) -> Vec<Arc<ResourceType>>;

    fn resource_type(&self, kind: &str) -> Option<Arc<ResourceType>> {
        self.resource_types()
            .into_iter()
            .find(|rt| rt.kind() == kind)
    }

    /// Names of plugins this one expects to be loaded. Declared only.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn create_hooks(&self) -> Vec<Arc<dyn CreateHook>> {
        Vec::new()
    }

    fn command_hooks(&self) -> Vec<Arc<dyn CommandHook>> {
        Vec::new()
    }

    /// Wipe everything the plugin keeps outside its resources.
    async fn reset(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Plugin-specific operations that run as a task list.
    fn execute_task_list(
        &self,
        method: &str,
        _request: &ResourceRequest,
    ) -> Result<TaskList<ResourceContext>, ResourceError> {
        Err(ResourceError::UnknownMethod {
            plugin: self.name().to_string(),
            method: method.to_string(),
        })
    }

    /// Plugin-specific queries.
    async fn request(
        &self,
        method: &str,
        _request: &ResourceRequest,
    ) -> Result<serde_json::Value, ResourceError> {
        Err(ResourceError::UnknownMethod {
            plugin: self.name().to_string(),
            method: method.to_string(),
        })
    }
}

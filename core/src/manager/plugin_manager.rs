use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ResourceError;
use crate::plugin::{CommandHook, CreateHook, Plugin};
use crate::resource::{BaseResource, ResourceContext, ResourceType};
use crate::task::TaskStream;

use super::api::{ResourceManagement, ResourceRequest, ResourceStream};
use super::resource_manager::{relay, ResourceManager};
use super::store::ResourceStore;

/// In-process [`ResourceManagement`]: every loaded plugin and one
/// [`ResourceManager`] per `{plugin, kind}`.
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
    managers: BTreeMap<(String, String), Arc<ResourceManager>>,
    store: Arc<ResourceStore>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("kinds", &self.managers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginManager {
    pub fn new(
        plugins: Vec<Arc<dyn Plugin>>,
        store: Arc<ResourceStore>,
    ) -> Result<Self, ResourceError> {
        let mut seen = BTreeSet::new();
        for plugin in &plugins {
            if !seen.insert(plugin.name().to_string()) {
                return Err(ResourceError::DuplicatePlugin(plugin.name().to_string()));
            }
        }

        for plugin in &plugins {
            for dependency in plugin.dependencies() {
                if !seen.contains(&dependency) {
                    tracing::warn!(
                        plugin = plugin.name(),
                        dependency = %dependency,
                        "plugin dependency is not loaded"
                    );
                }
            }
        }

        let create_hooks: Arc<Vec<Arc<dyn CreateHook>>> =
            Arc::new(plugins.iter().flat_map(|p| p.create_hooks()).collect());

        let mut managers = BTreeMap::new();
        for plugin in &plugins {
            let kinds = plugin.resource_types();
            tracing::info!(
                plugin = plugin.name(),
                kinds = kinds.len(),
                "plugin registered"
            );
            for resource_type in kinds {
                let key = (
                    resource_type.plugin().to_string(),
                    resource_type.kind().to_string(),
                );
                let manager = ResourceManager::new(
                    resource_type,
                    Arc::clone(&create_hooks),
                    Arc::clone(&store),
                );
                managers.insert(key, manager);
            }
        }

        Ok(Self {
            plugins,
            managers,
            store,
        })
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn plugin(&self, name: &str) -> Result<&Arc<dyn Plugin>, ResourceError> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| ResourceError::PluginNotFound(name.to_string()))
    }

    pub fn resource_types(&self) -> Vec<Arc<ResourceType>> {
        self.managers
            .values()
            .map(|m| Arc::clone(m.resource_type()))
            .collect()
    }

    /// Find the type for `kind`. Without `plugin`, the kind must be provided
    /// by exactly one loaded plugin.
    pub fn resolve_kind(
        &self,
        plugin: Option<&str>,
        kind: &str,
    ) -> Result<Arc<ResourceType>, ResourceError> {
        if let Some(plugin) = plugin {
            return Ok(Arc::clone(self.manager(plugin, kind)?.resource_type()));
        }

        let matches = self
            .managers
            .iter()
            .filter(|((_, k), _)| k == kind)
            .map(|(_, m)| m.resource_type())
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [only] => Ok(Arc::clone(only)),
            [] => Err(ResourceError::KindNotFound {
                plugin: "*".to_string(),
                kind: kind.to_string(),
            }),
            many => Err(ResourceError::AmbiguousKind(
                kind.to_string(),
                many.iter()
                    .map(|rt| rt.plugin())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    pub fn manager(&self, plugin: &str, kind: &str) -> Result<&Arc<ResourceManager>, ResourceError> {
        self.managers
            .get(&(plugin.to_string(), kind.to_string()))
            .ok_or_else(|| {
                if self.plugins.iter().any(|p| p.name() == plugin) {
                    ResourceError::KindNotFound {
                        plugin: plugin.to_string(),
                        kind: kind.to_string(),
                    }
                } else {
                    ResourceError::PluginNotFound(plugin.to_string())
                }
            })
    }

    /// Command hooks of every plugin, in plugin order.
    pub fn command_hooks(&self) -> Vec<Arc<dyn CommandHook>> {
        self.plugins.iter().flat_map(|p| p.command_hooks()).collect()
    }

    /// Re-adopt one resource, e.g. from another process's records.
    pub async fn adopt(&self, resource: BaseResource) -> Result<(), ResourceError> {
        self.manager(&resource.plugin, &resource.resource_type)?
            .adopt(resource)
            .await
    }

    /// Adopt every stored resource. Records that can't be adopted are
    /// skipped with a warning. Returns how many were adopted.
    pub async fn load(&self) -> usize {
        let mut adopted = 0;
        for resource in self.store.resources() {
            let key = resource.key();
            match self.adopt(resource).await {
                Ok(()) => adopted += 1,
                Err(e) => tracing::warn!(resource = %key, error = %e, "skipping stored resource"),
            }
        }
        tracing::debug!(adopted, "stored resources loaded");
        adopted
    }

    /// Forget every resource and let every plugin wipe its own state.
    pub async fn reset_all(&self) -> Result<(), ResourceError> {
        for manager in self.managers.values() {
            manager.reset().await;
        }
        self.store.clear();
        for plugin in &self.plugins {
            plugin.reset().await?;
            tracing::info!(plugin = plugin.name(), "plugin reset");
        }
        Ok(())
    }

    /// Destroy every adapter. Stored records survive for the next process.
    pub async fn shutdown(&self) {
        for manager in self.managers.values() {
            manager.shutdown().await;
        }
    }
}

#[async_trait]
impl ResourceManagement for PluginManager {
    async fn list_resources(
        &self,
        request: ResourceRequest,
    ) -> Result<ResourceStream, ResourceError> {
        Ok(self
            .manager(&request.plugin, &request.kind)?
            .list(request.cancel))
    }

    async fn get_resource(
        &self,
        request: ResourceRequest,
    ) -> Result<Option<BaseResource>, ResourceError> {
        let manager = self.manager(&request.plugin, &request.kind)?;
        Ok(manager.get(request.require_name("get")?))
    }

    async fn create_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError> {
        self.manager(&request.plugin, &request.kind)?
            .create(request)
            .await
    }

    async fn delete_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError> {
        self.manager(&request.plugin, &request.kind)?
            .delete(request)
            .await
    }

    async fn start_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError> {
        self.manager(&request.plugin, &request.kind)?
            .start(request)
            .await
    }

    async fn stop_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError> {
        self.manager(&request.plugin, &request.kind)?
            .stop(request)
            .await
    }

    async fn execute_task_list(
        &self,
        method: &str,
        request: ResourceRequest,
    ) -> Result<TaskStream, ResourceError> {
        let list = self
            .plugin(&request.plugin)?
            .execute_task_list(method, &request)?;
        tracing::debug!(plugin = %request.plugin, method, "plugin task list");
        let ctx = ResourceContext {
            request: crate::resource::CreateRequest {
                plugin: request.plugin.clone(),
                kind: request.kind.clone(),
                name: request.name.clone().unwrap_or_default(),
                args: request.args.clone(),
                options: request.options.clone(),
            },
            ..Default::default()
        };
        Ok(relay(list, ctx, request.cancel))
    }

    async fn request(
        &self,
        method: &str,
        request: ResourceRequest,
    ) -> Result<serde_json::Value, ResourceError> {
        self.plugin(&request.plugin)?
            .request(method, &request)
            .await
    }
}

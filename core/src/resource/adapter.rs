use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::task::TaskList;

use super::types::{BaseResource, CreateRequest, ResourceContext, ResourceState};

/// Live controller for one resource instance.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Current view of the resource.
    fn resource(&self) -> BaseResource;

    fn delete(&self) -> TaskList<ResourceContext>;

    fn start(&self) -> TaskList<ResourceContext>;

    fn stop(&self) -> TaskList<ResourceContext>;

    /// Every change of the resource, current value first.
    fn watch(&self) -> watch::Receiver<BaseResource>;

    fn debug_info(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Release whatever the adapter holds. Called once, at shutdown or after
    /// the resource was deleted.
    async fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Factory for the adapters of one resource kind.
#[async_trait]
pub trait MasterResourceAdapter: Send + Sync {
    /// Re-adopt a resource that existed before the server restarted.
    async fn init_resource_adapter(
        &self,
        resource: BaseResource,
    ) -> anyhow::Result<Arc<dyn ResourceAdapter>>;

    /// Build the list that creates `request.name`. A successful run must leave
    /// the new adapter in `ResourceContext::adapter`.
    fn create(&self, request: &CreateRequest) -> anyhow::Result<TaskList<ResourceContext>>;
}

/// Watchable [`BaseResource`] for adapters to hold.
#[derive(Debug, Clone)]
pub struct ResourceCell {
    tx: Arc<watch::Sender<BaseResource>>,
}

impl ResourceCell {
    pub fn new(resource: BaseResource) -> Self {
        let (tx, _) = watch::channel(resource);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> BaseResource {
        self.tx.borrow().clone()
    }

    pub fn set_state(&self, state: ResourceState) {
        self.tx.send_if_modified(|resource| {
            if resource.state == state {
                return false;
            }
            resource.state = state;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<BaseResource> {
        self.tx.subscribe()
    }
}

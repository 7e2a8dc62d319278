use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::cancel::CancelSignal;
use crate::error::ResourceError;
use crate::resource::{BaseResource, CreateRequest};
use crate::task::TaskStream;

/// Live listing of one resource kind; each item is the full current list.
pub type ResourceStream = BoxStream<'static, Vec<BaseResource>>;

/// Arguments shared by every call of the resource-management surface.
#[derive(Debug, Clone, Default)]
pub struct ResourceRequest {
    pub plugin: String,
    pub kind: String,
    pub name: Option<String>,
    pub args: Vec<String>,
    pub options: serde_json::Value,
    pub cancel: CancelSignal,
}

impl ResourceRequest {
    pub fn new(plugin: &str, kind: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn require_name(&self, call: &'static str) -> Result<&str, ResourceError> {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or(ResourceError::MissingName(call))
    }

    pub fn to_create_request(&self) -> Result<CreateRequest, ResourceError> {
        Ok(CreateRequest {
            plugin: self.plugin.clone(),
            kind: self.kind.clone(),
            name: self.require_name("create")?.to_string(),
            args: self.args.clone(),
            options: self.options.clone(),
        })
    }
}

/// The surface CRUD verbs call. Mutations return the live progress of a
/// server-side task list; reads return resource data. How calls travel
/// between client and server is not this trait's concern.
#[async_trait]
pub trait ResourceManagement: Send + Sync {
    async fn list_resources(&self, request: ResourceRequest)
        -> Result<ResourceStream, ResourceError>;

    async fn get_resource(
        &self,
        request: ResourceRequest,
    ) -> Result<Option<BaseResource>, ResourceError>;

    async fn create_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError>;

    async fn delete_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError>;

    async fn start_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError>;

    async fn stop_resource(&self, request: ResourceRequest) -> Result<TaskStream, ResourceError>;

    async fn execute_task_list(
        &self,
        method: &str,
        request: ResourceRequest,
    ) -> Result<TaskStream, ResourceError>;

    async fn request(
        &self,
        method: &str,
        request: ResourceRequest,
    ) -> Result<serde_json::Value, ResourceError>;
}

//! The resource-management surface and its in-process implementation.

mod api;
mod plugin_manager;
mod resource_manager;
mod store;

pub use api::{ResourceManagement, ResourceRequest, ResourceStream};
pub use plugin_manager::PluginManager;
pub use resource_manager::ResourceManager;
pub use store::ResourceStore;

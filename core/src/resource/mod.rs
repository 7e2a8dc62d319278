//! Resources, their per-instance and per-kind controllers, and resource kinds.

mod adapter;
mod names;
mod resource_type;
mod types;

pub use adapter::{MasterResourceAdapter, ResourceAdapter, ResourceCell};
pub use names::{capitalize, pluralize, ResourceNames};
pub use resource_type::{ResourceFilter, ResourceType};
pub use types::{BaseResource, CreateRequest, ResourceContext, ResourceKey, ResourceState};

//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `chainkit_core::api` instead of reaching into internal modules.

pub use crate::cancel::CancelSignal;
pub use crate::config::{
    load_default, AppConfig, LoggingConfig, PluginsConfig, TasksConfig,
};
pub use crate::crud::{Autocomplete, CommandOption, CompletionSource, CrudCommand, CrudVerb};
pub use crate::error::{CliError, ResourceError};
pub use crate::manager::{
    PluginManager, ResourceManagement, ResourceManager, ResourceRequest, ResourceStore,
    ResourceStream,
};
pub use crate::plugin::{CommandHook, CommandInvocation, CommandResult, CreateHook, Plugin};
pub use crate::resource::{
    BaseResource, CreateRequest, MasterResourceAdapter, ResourceAdapter, ResourceCell,
    ResourceContext, ResourceKey, ResourceNames, ResourceState, ResourceType,
};
pub use crate::task::{
    first_error, last_update, Skipped, Task, TaskContext, TaskFailure, TaskList, TaskListBuilder,
    TaskListOutcome, TaskStatus, TaskStream, TaskUpdate,
};

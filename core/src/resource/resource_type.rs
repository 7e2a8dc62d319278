use std::fmt;
use std::sync::Arc;

use futures::StreamExt;

use crate::cancel::CancelSignal;
use crate::crud::{CommandOption, CrudCommand, CrudVerb};
use crate::error::ResourceError;
use crate::manager::{ResourceManagement, ResourceRequest};

use super::adapter::MasterResourceAdapter;
use super::names::ResourceNames;
use super::types::BaseResource;

/// Narrows a resource listing; receives the command's options.
pub type ResourceFilter =
    Arc<dyn Fn(Vec<BaseResource>, &serde_json::Value) -> Vec<BaseResource> + Send + Sync>;

/// One plugin-declared kind of resource ("network", "wallet", ...).
pub struct ResourceType {
    plugin: String,
    kind: String,
    names: ResourceNames,
    master: Arc<dyn MasterResourceAdapter>,
    filter: Option<ResourceFilter>,
    create_args: Vec<String>,
    create_options: Vec<CommandOption>,
    start_on_create: bool,
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("plugin", &self.plugin)
            .field("kind", &self.kind)
            .field("names", &self.names)
            .finish()
    }
}

impl ResourceType {
    pub fn new(plugin: &str, kind: &str, master: Arc<dyn MasterResourceAdapter>) -> Self {
        Self {
            plugin: plugin.to_string(),
            kind: kind.to_string(),
            names: ResourceNames::new(kind),
            master,
            filter: None,
            create_args: Vec::new(),
            create_options: Vec::new(),
            start_on_create: false,
        }
    }

    pub fn with_names(mut self, names: ResourceNames) -> Self {
        self.names = names;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(Vec<BaseResource>, &serde_json::Value) -> Vec<BaseResource> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Extra positional arguments accepted by `create` after the name.
    pub fn with_create_args(mut self, args: &[&str]) -> Self {
        self.create_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_create_option(mut self, option: CommandOption) -> Self {
        self.create_options.push(option);
        self
    }

    /// Resources of this kind should be started right after creation.
    pub fn start_on_create(mut self, start: bool) -> Self {
        self.start_on_create = start;
        self
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    pub fn master(&self) -> &Arc<dyn MasterResourceAdapter> {
        &self.master
    }

    pub fn create_args(&self) -> &[String] {
        &self.create_args
    }

    pub fn create_options(&self) -> &[CommandOption] {
        &self.create_options
    }

    pub fn starts_on_create(&self) -> bool {
        self.start_on_create
    }

    pub fn filter(&self) -> Option<&ResourceFilter> {
        self.filter.as_ref()
    }

    /// The six lifecycle verbs for this kind.
    pub fn crud_commands(&self) -> Vec<CrudCommand> {
        CrudVerb::ALL
            .iter()
            .map(|verb| CrudCommand::for_type(self, *verb))
            .collect()
    }

    pub fn crud_command(&self, verb: CrudVerb) -> CrudCommand {
        CrudCommand::for_type(self, verb)
    }

    pub fn filter_resources(
        &self,
        resources: Vec<BaseResource>,
        options: &serde_json::Value,
    ) -> Vec<BaseResource> {
        match &self.filter {
            Some(filter) => filter(resources, options),
            None => resources,
        }
    }

    /// Current resources of this kind, filtered. Single-shot.
    pub async fn query(
        &self,
        api: &dyn ResourceManagement,
        options: serde_json::Value,
        cancel: CancelSignal,
    ) -> Result<Vec<BaseResource>, ResourceError> {
        let request = ResourceRequest::new(&self.plugin, &self.kind)
            .with_options(options.clone())
            .with_cancel(cancel);
        let mut stream = api.list_resources(request).await?;
        let resources = stream.next().await.unwrap_or_default();
        Ok(self.filter_resources(resources, &options))
    }

    pub fn format_table(&self, resources: &[BaseResource]) -> String {
        if resources.is_empty() {
            return format!("No {} found.\n", self.names.plural);
        }

        let name_width = resources
            .iter()
            .map(|r| r.name.len())
            .chain(std::iter::once("NAME".len()))
            .max()
            .unwrap_or(4);

        let mut out = format!("{:<name_width$}  STATE\n", "NAME");
        for resource in resources {
            out.push_str(&format!(
                "{:<name_width$}  {}\n",
                resource.name, resource.state
            ));
        }
        out
    }

    pub fn format_describe(&self, resource: &BaseResource, debug: &serde_json::Value) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}: {}\n", self.names.capitalized, resource.name));
        out.push_str(&format!("  Plugin:    {}\n", resource.plugin));
        out.push_str(&format!("  Base name: {}\n", resource.base_name));
        out.push_str(&format!("  State:     {}\n", resource.state));
        if let Some(fields) = debug.as_object().filter(|o| !o.is_empty()) {
            out.push_str("  Details:\n");
            for (key, value) in fields {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.push_str(&format!("    {key}: {value}\n"));
            }
        }
        out
    }
}

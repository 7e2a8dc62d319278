use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelSignal;
use crate::error::ResourceError;
use crate::manager::{ResourceManagement, ResourceRequest, ResourceStream};
use crate::resource::{
    BaseResource, ResourceFilter, ResourceNames, ResourceState, ResourceType,
};
use crate::task::TaskStream;

use super::verb::CrudVerb;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub short: Option<char>,
    pub help: String,
    /// `false` for boolean flags.
    pub takes_value: bool,
    pub default: Option<String>,
}

impl CommandOption {
    pub fn flag(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            short: None,
            help: help.to_string(),
            takes_value: false,
            default: None,
        }
    }

    pub fn value(name: &str, help: &str, default: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            short: None,
            help: help.to_string(),
            takes_value: true,
            default: default.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionSource {
    /// Names of existing resources of the command's kind, optionally only
    /// those in one state.
    Resources { state: Option<ResourceState> },
    Values(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autocomplete {
    pub positional: String,
    pub source: CompletionSource,
}

/// Declarative description of one verb for one resource kind, plus the
/// call it translates into.
#[derive(Clone)]
pub struct CrudCommand {
    pub verb: CrudVerb,
    pub plugin: String,
    pub kind: String,
    pub names: ResourceNames,
    /// e.g. `create network <name> [chain-id]`
    pub command: String,
    pub help: String,
    pub aliases: Vec<String>,
    pub positionals: Vec<String>,
    pub options: Vec<CommandOption>,
    pub autocomplete: Vec<Autocomplete>,
    /// Create only: the command layer should start the resource afterwards.
    pub start_on_create: bool,
    filter: Option<ResourceFilter>,
}

impl std::fmt::Debug for CrudCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudCommand")
            .field("verb", &self.verb)
            .field("plugin", &self.plugin)
            .field("command", &self.command)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl CrudCommand {
    pub fn for_type(resource_type: &ResourceType, verb: CrudVerb) -> Self {
        let kind = resource_type.kind();
        let names = resource_type.names().clone();

        let mut positionals = Vec::new();
        let mut options = Vec::new();
        let mut autocomplete = Vec::new();

        let help = match verb {
            CrudVerb::Get => format!("Lists all {}", names.plural),
            _ => verb.help_for(kind),
        };

        if verb.takes_name() {
            positionals.push("name".to_string());
        }

        match verb {
            CrudVerb::Create => {
                positionals.extend(resource_type.create_args().iter().cloned());
                options.extend(resource_type.create_options().iter().cloned());
                options.push(CommandOption::flag(
                    "start",
                    &format!("Start the {kind} once it is created"),
                ));
            }
            CrudVerb::Delete | CrudVerb::Describe => autocomplete.push(Autocomplete {
                positional: "name".to_string(),
                source: CompletionSource::Resources { state: None },
            }),
            CrudVerb::Start => autocomplete.push(Autocomplete {
                positional: "name".to_string(),
                source: CompletionSource::Resources {
                    state: Some(ResourceState::Stopped),
                },
            }),
            CrudVerb::Stop => autocomplete.push(Autocomplete {
                positional: "name".to_string(),
                source: CompletionSource::Resources {
                    state: Some(ResourceState::Started),
                },
            }),
            CrudVerb::Get => options.push(CommandOption::flag(
                "watch",
                &format!("Keep listing {} as they change", names.plural),
            )),
        }

        let mut command = format!("{verb} {kind}");
        for (i, positional) in positionals.iter().enumerate() {
            if i == 0 {
                command.push_str(&format!(" <{positional}>"));
            } else {
                command.push_str(&format!(" [{positional}]"));
            }
        }

        Self {
            verb,
            plugin: resource_type.plugin().to_string(),
            kind: kind.to_string(),
            names,
            command,
            help,
            aliases: verb.aliases().iter().map(|a| a.to_string()).collect(),
            positionals,
            options,
            autocomplete,
            start_on_create: verb == CrudVerb::Create && resource_type.starts_on_create(),
            filter: resource_type.filter().cloned(),
        }
    }

    /// "Creating network local"
    pub fn progress_title(&self, name: &str) -> String {
        format!(
            "{} {} {name}",
            crate::resource::capitalize(&self.verb.present_participle()),
            self.kind
        )
    }

    /// "Created network local"
    pub fn done_title(&self, name: &str) -> String {
        format!(
            "{} {} {name}",
            crate::resource::capitalize(&self.verb.past_participle()),
            self.kind
        )
    }

    fn request(&self, cancel: CancelSignal) -> ResourceRequest {
        ResourceRequest::new(&self.plugin, &self.kind).with_cancel(cancel)
    }

    /// Run create/delete/start/stop. The returned stream relays the
    /// server-side task list; `cancel` reaches that list's abort path.
    pub async fn mutate(
        &self,
        api: &dyn ResourceManagement,
        name: &str,
        args: Vec<String>,
        options: serde_json::Value,
        cancel: CancelSignal,
    ) -> Result<TaskStream, ResourceError> {
        let request = self
            .request(cancel)
            .with_name(name)
            .with_args(args)
            .with_options(options);

        tracing::debug!(verb = %self.verb, kind = %self.kind, name, "crud mutation");
        match self.verb {
            CrudVerb::Create => api.create_resource(request).await,
            CrudVerb::Delete => api.delete_resource(request).await,
            CrudVerb::Start => api.start_resource(request).await,
            CrudVerb::Stop => api.stop_resource(request).await,
            CrudVerb::Get | CrudVerb::Describe => Err(ResourceError::UnknownMethod {
                plugin: self.plugin.clone(),
                method: self.verb.to_string(),
            }),
        }
    }

    /// Live, filtered listing. Whether to keep following it is up to the caller.
    pub async fn list(
        &self,
        api: &dyn ResourceManagement,
        options: serde_json::Value,
        cancel: CancelSignal,
    ) -> Result<ResourceStream, ResourceError> {
        let request = self.request(cancel).with_options(options.clone());
        let stream = api.list_resources(request).await?;
        let filter = self.filter.clone();
        Ok(stream
            .map(move |resources| match &filter {
                Some(filter) => filter(resources, &options),
                None => resources,
            })
            .boxed())
    }

    pub async fn describe(
        &self,
        api: &dyn ResourceManagement,
        name: &str,
        cancel: CancelSignal,
    ) -> Result<BaseResource, ResourceError> {
        let request = self.request(cancel).with_name(name);
        api.get_resource(request)
            .await?
            .ok_or_else(|| ResourceError::not_found(&self.kind, name))
    }

    /// Candidates for the first positional, filtered by `prefix`.
    pub async fn completions(
        &self,
        api: &dyn ResourceManagement,
        prefix: &str,
    ) -> Result<Vec<String>, ResourceError> {
        let Some(source) = self.autocomplete.first().map(|a| a.source.clone()) else {
            return Ok(Vec::new());
        };

        let candidates = match source {
            CompletionSource::Values(values) => values,
            CompletionSource::Resources { state } => {
                let mut stream = self
                    .list(api, serde_json::Value::Null, CancelSignal::never())
                    .await?;
                stream
                    .next()
                    .await
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|r| state.map_or(true, |s| r.state == s))
                    .map(|r| r.name)
                    .collect()
            }
        };

        Ok(candidates
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{
        CreateRequest, MasterResourceAdapter, ResourceAdapter, ResourceContext,
    };
    use crate::task::TaskList;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct NoopMaster;

    #[async_trait::async_trait]
    impl MasterResourceAdapter for NoopMaster {
        async fn init_resource_adapter(
            &self,
            _resource: BaseResource,
        ) -> anyhow::Result<Arc<dyn ResourceAdapter>> {
            anyhow::bail!("not supported")
        }

        fn create(&self, _request: &CreateRequest) -> anyhow::Result<TaskList<ResourceContext>> {
            Ok(TaskList::new([]))
        }
    }

    fn network() -> ResourceType {
        ResourceType::new("devnet", "network", Arc::new(NoopMaster))
            .with_create_args(&["chain-id"])
            .start_on_create(true)
    }

    #[test]
    fn test_create_descriptor() {
        let cmd = network().crud_command(CrudVerb::Create);
        assert_eq!(cmd.command, "create network <name> [chain-id]");
        assert_eq!(cmd.help, "Creates a network called <name>");
        assert_eq!(cmd.positionals, vec!["name", "chain-id"]);
        assert!(cmd.options.iter().any(|o| o.name == "start"));
        assert!(cmd.start_on_create);
    }

    #[test]
    fn test_stop_descriptor() {
        let cmd = network().crud_command(CrudVerb::Stop);
        assert_eq!(cmd.command, "stop network <name>");
        assert_eq!(cmd.help, "Stops a network called <name>");
        assert_eq!(cmd.aliases, vec!["down"]);
        assert_eq!(
            cmd.autocomplete[0].source,
            CompletionSource::Resources {
                state: Some(ResourceState::Started)
            }
        );
        assert!(!cmd.start_on_create);
        assert_eq!(cmd.progress_title("local"), "Stopping network local");
        assert_eq!(cmd.done_title("local"), "Stopped network local");
    }

    #[test]
    fn test_get_and_describe_descriptors() {
        let get = network().crud_command(CrudVerb::Get);
        assert_eq!(get.command, "get network");
        assert_eq!(get.help, "Lists all networks");
        assert!(get.positionals.is_empty());

        let describe = network().crud_command(CrudVerb::Describe);
        assert_eq!(describe.command, "describe network <name>");
        assert_eq!(describe.help, "Describes a network called <name>");
    }
}
